//! Core field and bundle types for the record type registry.
//!
//! All types serialize to/from YAML via serde. Field definitions describe
//! named, typed attributes. Bundle definitions are record types listing which
//! fields they declare and which field answers each primary role.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RegistryError, Result};

/// Role answered by a bundle's primary address field.
pub const ROLE_ADDRESS: &str = "address";
/// Role answered by a bundle's primary email field.
pub const ROLE_EMAIL: &str = "email";
/// Role answered by a bundle's primary phone field.
pub const ROLE_PHONE: &str = "phone";

/// The type of a field — determines what shape the value takes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FieldType {
    Text {
        #[serde(default)]
        single_line: bool,
    },
    Email,
    Phone,
    /// Structured postal address, stored as a JSON object.
    Address,
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Date,
    Boolean,
    /// Stores ids pointing at another record type.
    Reference {
        bundle: String,
        #[serde(default)]
        multiple: bool,
    },
}

/// Check that `name` can name a bundle or field definition.
///
/// Names double as file names in the YAML store, so they must be non-empty,
/// must not start with a dot and must not contain path separators or NUL.
pub fn validate_name(kind: &'static str, name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        "is empty"
    } else if name.starts_with('.') {
        "starts with a dot"
    } else if name.contains(['/', '\\']) {
        "contains a path separator"
    } else if name.contains('\0') {
        "contains a NUL byte"
    } else {
        return Ok(());
    };
    Err(RegistryError::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    })
}

fn default_revisionable() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

/// Schema for a single named extension field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub type_: FieldType,
    /// Value applied on record creation when the caller leaves the field unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default = "default_revisionable", skip_serializing_if = "is_true")]
    pub revisionable: bool,
}

impl FieldDef {
    /// A revisionable field of the given type with no description or default.
    pub fn new(name: impl Into<String>, type_: FieldType) -> Self {
        Self {
            name: name.into(),
            description: None,
            type_,
            default: None,
            revisionable: true,
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A record type with its declared fields and primary field mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    /// Role name -> field name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub primary_fields: BTreeMap<String, String>,
}

impl BundleDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            description: None,
            fields: Vec::new(),
            primary_fields: BTreeMap::new(),
        }
    }

    /// Declare a field on this bundle.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    /// Map a role to a field name.
    pub fn primary(mut self, role: impl Into<String>, field: impl Into<String>) -> Self {
        self.primary_fields.insert(role.into(), field.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Whether `field` is declared on this bundle.
    pub fn declares(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Field name configured for `role`. Empty values count as unmapped.
    pub fn primary_field(&self, role: &str) -> Option<&str> {
        self.primary_fields
            .get(role)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }
}

/// A bundle definition resolved against the field registry.
///
/// Built by `RecordTypeRegistry::schema`. Declared fields without a
/// registered `FieldDef` are still declared, just untyped and without a default.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleSchema {
    pub bundle: BundleDef,
    pub fields: BTreeMap<String, FieldDef>,
}

impl BundleSchema {
    pub fn name(&self) -> &str {
        &self.bundle.name
    }

    pub fn declares(&self, field: &str) -> bool {
        self.bundle.declares(field)
    }

    pub fn field_def(&self, field: &str) -> Option<&FieldDef> {
        self.fields.get(field)
    }

    pub fn primary_field(&self, role: &str) -> Option<&str> {
        self.bundle.primary_field(role)
    }

    /// Declared field names that carry a default value, with that default.
    pub fn defaults(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bundle.fields.iter().filter_map(|name| {
            self.fields
                .get(name)
                .and_then(|def| def.default.as_ref())
                .map(|value| (name.as_str(), value))
        })
    }
}
