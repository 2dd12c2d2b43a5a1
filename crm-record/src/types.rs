//! Record data model.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use ulid::Ulid;

/// Field values keyed by field name, as accepted by `create`/`update`.
pub type FieldMap = BTreeMap<String, Value>;

/// Base field holding the display name.
pub const FIELD_NAME: &str = "name";
/// Base field holding the language code.
pub const FIELD_LANGCODE: &str = "langcode";
/// Base field holding the owner id.
pub const FIELD_OWNER: &str = "uid";

/// Base fields that can be read with `get_field` but never written.
pub const READ_ONLY_FIELDS: &[&str] = &["id", "revision_id", "uuid", "type", "created", "changed"];

/// Record identifier. Stable across revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Revision number, strictly increasing per record and starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(pub u64);

impl RevisionId {
    pub const FIRST: RevisionId = RevisionId(1);

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account that owns a record. Resolved by an `OwnerResolver`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OwnerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One revision of a record. Every revision is a full snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub revision_id: RevisionId,
    pub uuid: Ulid,
    /// Record type. Set at creation, never changes.
    #[serde(rename = "type")]
    pub bundle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub owner: OwnerId,
    pub langcode: String,
    pub created_at: DateTime<Utc>,
    pub changed_at: DateTime<Utc>,
    #[serde(default)]
    pub fields: FieldMap,
}

impl Record {
    /// Value of a base field, or `None` if `field` is not a base field.
    pub fn base_value(&self, field: &str) -> Option<Value> {
        let value = match field {
            "id" => json!(self.id.0),
            "revision_id" => json!(self.revision_id.0),
            "uuid" => json!(self.uuid.to_string()),
            "type" => json!(self.bundle),
            "created" => json!(self.created_at.to_rfc3339()),
            "changed" => json!(self.changed_at.to_rfc3339()),
            FIELD_NAME => self.name.clone().map(Value::String).unwrap_or(Value::Null),
            FIELD_LANGCODE => json!(self.langcode),
            FIELD_OWNER => json!(self.owner.as_str()),
            _ => return None,
        };
        Some(value)
    }

    /// Whether `field` is one of the base fields every record carries.
    pub fn is_base_field(field: &str) -> bool {
        matches!(field, FIELD_NAME | FIELD_LANGCODE | FIELD_OWNER) || READ_ONLY_FIELDS.contains(&field)
    }
}
