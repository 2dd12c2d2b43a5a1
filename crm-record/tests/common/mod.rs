#![allow(dead_code)]

use std::sync::Arc;

use crm_fields::{
    BundleDef, FieldDef, FieldType, MemoryBundleStore, RecordTypeRegistry, RegistryDefaults,
    ROLE_EMAIL, ROLE_PHONE,
};
use crm_record::{FieldMap, MemoryRecordStore, RecordService, RecordStore};
use serde_json::Value;

/// `person` declares its primary email and phone fields; `organization` maps
/// its email role to a field it never declares.
pub fn defaults() -> RegistryDefaults {
    RegistryDefaults::new()
        .field(FieldDef::new("email_address", FieldType::Email))
        .field(FieldDef::new("phone", FieldType::Phone))
        .field(
            FieldDef::new("status", FieldType::Text { single_line: true })
                .with_default(serde_json::json!("lead")),
        )
        .bundle(
            BundleDef::new("person")
                .with_label("Person")
                .field("email_address")
                .field("phone")
                .field("status")
                .field("notes")
                .primary(ROLE_EMAIL, "email_address")
                .primary(ROLE_PHONE, "phone"),
        )
        .bundle(
            BundleDef::new("organization")
                .field("website")
                .primary(ROLE_EMAIL, "contact_email"),
        )
}

pub async fn registry() -> Arc<RecordTypeRegistry> {
    Arc::new(
        RecordTypeRegistry::open(Arc::new(MemoryBundleStore::new()))
            .with_defaults(defaults())
            .build()
            .await
            .unwrap(),
    )
}

pub async fn service_with_store(store: Arc<dyn RecordStore>) -> RecordService {
    RecordService::builder(registry().await, store).build()
}

pub async fn service() -> RecordService {
    service_with_store(Arc::new(MemoryRecordStore::new())).await
}

pub fn fields<const N: usize>(pairs: [(&str, Value); N]) -> FieldMap {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
