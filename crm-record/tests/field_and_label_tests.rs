mod common;

use std::sync::Arc;

use chrono::Utc;
use common::{fields, registry, service};
use crm_record::{
    FieldMap, LabelHooks, MemoryRecordStore, OwnerId, Record, RecordError, RecordId,
    RecordService, RecordServiceConfig, RevisionId,
};
use serde_json::{json, Value};
use ulid::Ulid;

fn record_with_name(id: u64, name: Option<&str>) -> Record {
    let now = Utc::now();
    Record {
        id: RecordId(id),
        revision_id: RevisionId::FIRST,
        uuid: Ulid::new(),
        bundle: "organization".into(),
        name: name.map(str::to_string),
        owner: OwnerId::new("admin"),
        langcode: "und".into(),
        created_at: now,
        changed_at: now,
        fields: FieldMap::new(),
    }
}

async fn service_with_hooks(hooks: LabelHooks) -> RecordService {
    RecordService::builder(registry().await, Arc::new(MemoryRecordStore::new()))
        .label_hooks(hooks)
        .build()
}

#[tokio::test]
async fn get_field_reads_without_mutating() {
    let service = service().await;
    let record = service
        .create("person", "admin", fields([("phone", json!("555-0100"))]))
        .await
        .unwrap();
    let before = record.clone();

    let first = service.get_field(&record, "phone").await.unwrap();
    let second = service.get_field(&record, "phone").await.unwrap();
    assert_eq!(first, json!("555-0100"));
    assert_eq!(first, second);
    assert_eq!(record, before);
}

#[tokio::test]
async fn get_field_on_declared_but_unset_is_null() {
    let service = service().await;
    let record = service.create("person", "admin", FieldMap::new()).await.unwrap();
    assert_eq!(service.get_field(&record, "notes").await.unwrap(), Value::Null);
}

#[tokio::test]
async fn get_field_reads_base_fields() {
    let service = service().await;
    let record = service
        .create("person", "admin", fields([("name", json!("Ada"))]))
        .await
        .unwrap();
    assert_eq!(service.get_field(&record, "name").await.unwrap(), json!("Ada"));
    assert_eq!(service.get_field(&record, "type").await.unwrap(), json!("person"));
    assert_eq!(
        service.get_field(&record, "id").await.unwrap(),
        json!(record.id.0)
    );
}

#[tokio::test]
async fn get_field_rejects_undeclared() {
    let service = service().await;
    let record = service.create("person", "admin", FieldMap::new()).await.unwrap();
    let err = service.get_field(&record, "website").await.unwrap_err();
    assert!(matches!(
        err,
        RecordError::UnknownField { ref bundle, ref field } if bundle == "person" && field == "website"
    ));
}

#[tokio::test]
async fn primary_email_resolves_through_registry() {
    let service = service().await;
    let record = service
        .create(
            "person",
            "admin",
            fields([("email_address", json!("ada@example.com"))]),
        )
        .await
        .unwrap();
    assert_eq!(
        service.get_primary_email(&record).await.unwrap(),
        json!("ada@example.com")
    );
}

#[tokio::test]
async fn primary_email_mapped_to_undeclared_field_is_unknown_field() {
    let service = service().await;
    let record = service.create("organization", "admin", FieldMap::new()).await.unwrap();
    let err = service.get_primary_email(&record).await.unwrap_err();
    assert!(matches!(err, RecordError::UnknownField { ref field, .. } if field == "contact_email"));
}

#[tokio::test]
async fn unmapped_role_is_not_configured() {
    let service = service().await;
    let organization = service.create("organization", "admin", FieldMap::new()).await.unwrap();
    let err = service.get_primary_phone(&organization).await.unwrap_err();
    assert!(matches!(
        err,
        RecordError::PrimaryFieldNotConfigured { ref bundle, ref role }
            if bundle == "organization" && role == "phone"
    ));

    let person = service.create("person", "admin", FieldMap::new()).await.unwrap();
    let err = service.get_primary_address(&person).await.unwrap_err();
    assert!(matches!(err, RecordError::PrimaryFieldNotConfigured { .. }));
}

#[tokio::test]
async fn primary_field_follows_registry_changes() {
    let service = service().await;
    let record = service
        .create(
            "person",
            "admin",
            fields([("email_address", json!("ada@example.com"))]),
        )
        .await
        .unwrap();

    service
        .registry()
        .clear_primary_field_name("person", "email")
        .await
        .unwrap();
    assert!(matches!(
        service.get_primary_email(&record).await,
        Err(RecordError::PrimaryFieldNotConfigured { .. })
    ));

    service
        .registry()
        .set_primary_field_name("person", "email", "notes")
        .await
        .unwrap();
    assert_eq!(service.get_primary_email(&record).await.unwrap(), Value::Null);
}

#[tokio::test]
async fn nameless_label_embeds_id() {
    let service = service().await;
    assert_eq!(service.label(&record_with_name(42, Some(""))), "Nameless #42");
    assert_eq!(service.label(&record_with_name(42, None)), "Nameless #42");
}

#[tokio::test]
async fn named_label_is_verbatim() {
    let service = service().await;
    assert_eq!(
        service.label(&record_with_name(1, Some("Acme Corp"))),
        "Acme Corp"
    );
}

#[tokio::test]
async fn label_hooks_rewrite_in_order() {
    let upper = service_with_hooks(LabelHooks::new().with_fn(|_, label| label.to_uppercase())).await;
    assert_eq!(
        upper.label(&record_with_name(1, Some("Acme Corp"))),
        "ACME CORP"
    );

    let chained = service_with_hooks(
        LabelHooks::new()
            .with_fn(|_, label| format!("{label}!"))
            .with_fn(|record, label| format!("{} {label}", record.bundle)),
    )
    .await;
    assert_eq!(
        chained.label(&record_with_name(1, Some("Acme"))),
        "organization Acme!"
    );
}

#[tokio::test]
async fn hooks_also_see_the_nameless_placeholder() {
    let service = service_with_hooks(LabelHooks::new().with_fn(|_, label| label.to_lowercase())).await;
    assert_eq!(service.label(&record_with_name(42, None)), "nameless #42");
}

#[tokio::test]
async fn configured_placeholder_is_used() {
    let service = RecordService::builder(registry().await, Arc::new(MemoryRecordStore::new()))
        .config(RecordServiceConfig {
            nameless_label: "Unnamed record {id}".into(),
            ..RecordServiceConfig::default()
        })
        .build();
    assert_eq!(
        service.label(&record_with_name(9, None)),
        "Unnamed record 9"
    );
}
