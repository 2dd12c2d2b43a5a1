//! Record type registry for CRM records
//!
//! `crm-fields` is a schema-only crate that manages field definitions and
//! bundles (record types). It knows nothing about record values or
//! revisions. The record service consumes it to validate input and to
//! resolve primary fields.
//!
//! # Architecture
//!
//! - **Schema-only**: Owns field definitions and bundle definitions, not field values
//! - **Pluggable persistence**: `BundleConfigStore` with YAML-on-disk and in-memory backends
//! - **Primary fields**: Each bundle maps roles (`address`, `email`, `phone`) to one of its fields
//! - **Default seeding**: `with_defaults()` writes defaults that don't exist, preserves customizations

pub mod error;
pub mod registry;
pub mod store;
pub mod types;

pub use error::{RegistryError, Result};
pub use registry::{RecordTypeRegistry, RegistryBuilder, RegistryDefaults};
pub use store::{atomic_write, BundleConfigStore, MemoryBundleStore, YamlBundleStore};
pub use types::{
    validate_name, BundleDef, BundleSchema, FieldDef, FieldType, ROLE_ADDRESS, ROLE_EMAIL,
    ROLE_PHONE,
};
