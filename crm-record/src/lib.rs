//! Revisioned CRM records
//!
//! A record belongs to a bundle (record type) registered in a
//! [`crm_fields::RecordTypeRegistry`], carries the fields that bundle declares,
//! and is never edited in place: every change writes a new revision.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use crm_fields::{BundleDef, MemoryBundleStore, RecordTypeRegistry, RegistryDefaults, ROLE_EMAIL};
//! use crm_record::{FieldMap, MemoryRecordStore, RecordService};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = RecordTypeRegistry::open(Arc::new(MemoryBundleStore::new()))
//!     .with_defaults(RegistryDefaults::new().bundle(
//!         BundleDef::new("person")
//!             .field("email_address")
//!             .primary(ROLE_EMAIL, "email_address"),
//!     ))
//!     .build()
//!     .await?;
//! let service = RecordService::builder(Arc::new(registry), Arc::new(MemoryRecordStore::new())).build();
//!
//! let mut fields = FieldMap::new();
//! fields.insert("name".into(), json!("Ada Lovelace"));
//! fields.insert("email_address".into(), json!("ada@example.com"));
//! let record = service.create("person", "admin", fields).await?;
//!
//! assert_eq!(service.get_primary_email(&record).await?, json!("ada@example.com"));
//! assert_eq!(service.label(&record), "Ada Lovelace");
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage Structure (`FileRecordStore`)
//!
//! ```text
//! root/
//! ├── next_id
//! └── records/
//!     └── {id}/
//!         ├── {revision}.json
//!         └── deleted
//! ```

pub mod config;
pub mod error;
pub mod label;
pub mod owner;
pub mod service;
pub mod store;
pub mod types;

pub use config::RecordServiceConfig;
pub use error::{RecordError, Result, StoreError, StoreResult};
pub use label::{LabelHook, LabelHooks};
pub use owner::{AnyOwner, KnownOwners, OwnerResolver};
pub use service::{RecordService, RecordServiceBuilder};
pub use store::{FileRecordStore, MemoryRecordStore, RecordStore};
pub use types::{FieldMap, OwnerId, Record, RecordId, RevisionId};
