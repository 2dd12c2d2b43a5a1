//! RecordService — create, revise, delete and read CRM records.
//!
//! Writes to one record id are serialized by a per-id lock; different ids
//! proceed in parallel. Every storage and owner call runs under the configured
//! timeout and surfaces expiry as `StorageUnavailable` without retrying.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use crm_fields::{BundleSchema, RecordTypeRegistry, ROLE_ADDRESS, ROLE_EMAIL, ROLE_PHONE};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::config::RecordServiceConfig;
use crate::error::{RecordError, Result, StoreResult};
use crate::label::LabelHooks;
use crate::owner::{AnyOwner, OwnerResolver};
use crate::store::RecordStore;
use crate::types::{
    FieldMap, OwnerId, Record, RecordId, RevisionId, FIELD_LANGCODE, FIELD_NAME, FIELD_OWNER,
    READ_ONLY_FIELDS,
};

/// Builder for `RecordService`. Created by `RecordService::builder()`.
pub struct RecordServiceBuilder {
    registry: Arc<RecordTypeRegistry>,
    store: Arc<dyn RecordStore>,
    owners: Arc<dyn OwnerResolver>,
    hooks: LabelHooks,
    config: RecordServiceConfig,
}

impl RecordServiceBuilder {
    /// Owner validation. Defaults to [`AnyOwner`].
    pub fn owners(mut self, owners: Arc<dyn OwnerResolver>) -> Self {
        self.owners = owners;
        self
    }

    /// Label hooks, run in registration order by [`RecordService::label`].
    pub fn label_hooks(mut self, hooks: LabelHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(mut self, config: RecordServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> RecordService {
        debug!(
            hooks = self.hooks.len(),
            storage_timeout_ms = self.config.storage_timeout_ms,
            "record service built"
        );
        RecordService {
            registry: self.registry,
            store: self.store,
            owners: self.owners,
            hooks: self.hooks,
            config: self.config,
            locks: DashMap::new(),
        }
    }
}

/// Base-field and extension-field changes parsed from a caller's field map.
#[derive(Debug, Default)]
struct Changes {
    name: Option<Option<String>>,
    langcode: Option<String>,
    owner: Option<OwnerId>,
    fields: FieldMap,
}

impl Changes {
    /// Split `input` into base and extension fields, rejecting anything the
    /// bundle does not declare.
    fn parse(schema: &BundleSchema, input: FieldMap) -> Result<Self> {
        let mut changes = Changes::default();
        for (key, value) in input {
            match key.as_str() {
                FIELD_NAME => {
                    changes.name = Some(match value {
                        Value::Null => None,
                        Value::String(name) => Some(name),
                        _ => return Err(RecordError::invalid_value(FIELD_NAME, "expected a string")),
                    });
                }
                FIELD_LANGCODE => match value {
                    Value::String(code) if !code.is_empty() => changes.langcode = Some(code),
                    _ => {
                        return Err(RecordError::invalid_value(
                            FIELD_LANGCODE,
                            "expected a non-empty string",
                        ))
                    }
                },
                FIELD_OWNER => match value {
                    Value::String(owner) => changes.owner = Some(OwnerId::new(owner)),
                    _ => return Err(RecordError::invalid_value(FIELD_OWNER, "expected a string")),
                },
                _ => {
                    if READ_ONLY_FIELDS.contains(&key.as_str()) || !schema.declares(&key) {
                        return Err(RecordError::unknown_field(schema.name(), key));
                    }
                    changes.fields.insert(key, value);
                }
            }
        }
        Ok(changes)
    }

    fn apply(self, record: &mut Record) {
        if let Some(name) = self.name {
            record.name = name;
        }
        if let Some(langcode) = self.langcode {
            record.langcode = langcode;
        }
        if let Some(owner) = self.owner {
            record.owner = owner;
        }
        record.fields.extend(self.fields);
    }
}

/// Held write lock on one record id.
///
/// On drop the id's mutex leaves the lock map unless another caller is
/// still holding or waiting on it.
struct RecordLock<'a> {
    locks: &'a DashMap<RecordId, Arc<Mutex<()>>>,
    id: RecordId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RecordLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// CRUD, revisioning and field/label resolution for records.
pub struct RecordService {
    registry: Arc<RecordTypeRegistry>,
    store: Arc<dyn RecordStore>,
    owners: Arc<dyn OwnerResolver>,
    hooks: LabelHooks,
    config: RecordServiceConfig,
    locks: DashMap<RecordId, Arc<Mutex<()>>>,
}

impl RecordService {
    /// Start building a service over a registry and a store.
    ///
    /// ```rust,ignore
    /// let service = RecordService::builder(registry, Arc::new(MemoryRecordStore::new()))
    ///     .label_hooks(LabelHooks::new().with_fn(|_, label| label.to_uppercase()))
    ///     .build();
    /// ```
    pub fn builder(
        registry: Arc<RecordTypeRegistry>,
        store: Arc<dyn RecordStore>,
    ) -> RecordServiceBuilder {
        RecordServiceBuilder {
            registry,
            store,
            owners: Arc::new(AnyOwner),
            hooks: LabelHooks::new(),
            config: RecordServiceConfig::default(),
        }
    }

    pub fn registry(&self) -> &RecordTypeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RecordServiceConfig {
        &self.config
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create a record of `bundle` at revision 1.
    ///
    /// Declared fields left unset receive their configured default. A `uid`
    /// entry in `fields` takes precedence over `owner`.
    pub async fn create(
        &self,
        bundle: &str,
        owner: impl Into<OwnerId>,
        fields: FieldMap,
    ) -> Result<Record> {
        let schema = self.schema(bundle).await?;
        let changes = Changes::parse(&schema, fields)?;
        let owner = changes.owner.clone().unwrap_or_else(|| owner.into());
        self.check_owner(&owner).await?;

        let mut values = FieldMap::new();
        for (name, default) in schema.defaults() {
            values.insert(name.to_string(), default.clone());
        }

        let id = self.guarded("allocate_id", self.store.allocate_id()).await?;
        let now = Utc::now();
        let mut record = Record {
            id,
            revision_id: RevisionId::FIRST,
            uuid: Ulid::new(),
            bundle: bundle.to_string(),
            name: None,
            owner,
            langcode: self.config.default_langcode.clone(),
            created_at: now,
            changed_at: now,
            fields: values,
        };
        changes.apply(&mut record);

        self.guarded("save_revision", self.store.save_revision(&record))
            .await?;
        info!(id = %record.id, bundle, "record created");
        Ok(record)
    }

    /// Write a new revision of `id` with `fields` applied over the latest one.
    pub async fn update(&self, id: RecordId, fields: FieldMap) -> Result<Record> {
        let _guard = self.lock_record(id).await;

        let current = self.load_live(id).await?;
        let schema = self.schema(&current.bundle).await?;
        let changes = Changes::parse(&schema, fields)?;
        if let Some(owner) = &changes.owner {
            self.check_owner(owner).await?;
        }

        let mut next = self.next_revision(&current);
        changes.apply(&mut next);

        self.guarded("save_revision", self.store.save_revision(&next))
            .await?;
        info!(id = %id, revision = %next.revision_id, "record updated");
        Ok(next)
    }

    /// Write a new revision of `id` whose values equal those of `revision`.
    ///
    /// History is never rewritten; the reverted state becomes the latest revision.
    pub async fn revert(&self, id: RecordId, revision: RevisionId) -> Result<Record> {
        let _guard = self.lock_record(id).await;

        let current = self.load_live(id).await?;
        let target = self
            .guarded("load_revision", self.store.load_revision(id, revision))
            .await?;

        let mut next = self.next_revision(&current);
        next.name = target.name;
        next.owner = target.owner;
        next.langcode = target.langcode;
        next.fields = target.fields;

        self.guarded("save_revision", self.store.save_revision(&next))
            .await?;
        info!(id = %id, from = %revision, revision = %next.revision_id, "record reverted");
        Ok(next)
    }

    /// Terminate a record. No further revisions are accepted.
    pub async fn delete(&self, id: RecordId) -> Result<()> {
        let _guard = self.lock_record(id).await;

        self.ensure_live(id).await?;
        self.guarded("mark_deleted", self.store.mark_deleted(id))
            .await?;
        info!(id = %id, "record deleted");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Latest revision of a live record.
    pub async fn load(&self, id: RecordId) -> Result<Record> {
        self.load_live(id).await
    }

    /// One revision of a record. History stays readable after deletion.
    pub async fn load_revision(&self, id: RecordId, revision: RevisionId) -> Result<Record> {
        self.guarded("load_revision", self.store.load_revision(id, revision))
            .await
    }

    /// Revision numbers of a record, oldest first.
    pub async fn revisions(&self, id: RecordId) -> Result<Vec<RevisionId>> {
        self.guarded("list_revisions", self.store.list_revisions(id))
            .await
    }

    /// Stored value of `field` on this revision.
    ///
    /// Declared fields that were never set read as `Value::Null`.
    pub async fn get_field(&self, record: &Record, field: &str) -> Result<Value> {
        if let Some(value) = record.base_value(field) {
            return Ok(value);
        }
        let schema = self.schema(&record.bundle).await?;
        if !schema.declares(field) {
            return Err(RecordError::unknown_field(&record.bundle, field));
        }
        Ok(record.fields.get(field).cloned().unwrap_or(Value::Null))
    }

    /// Value of the field the record's bundle designates for `role`.
    ///
    /// `PrimaryFieldNotConfigured` means the bundle maps nothing to `role`;
    /// `UnknownField` means it maps to a field the bundle does not declare.
    pub async fn get_primary_field(&self, record: &Record, role: &str) -> Result<Value> {
        let field = self
            .registry
            .get_primary_field_name(&record.bundle, role)
            .await
            .ok_or_else(|| RecordError::PrimaryFieldNotConfigured {
                bundle: record.bundle.clone(),
                role: role.to_string(),
            })?;
        debug!(id = %record.id, role, field = %field, "resolved primary field");
        self.get_field(record, &field).await
    }

    pub async fn get_primary_address(&self, record: &Record) -> Result<Value> {
        self.get_primary_field(record, ROLE_ADDRESS).await
    }

    pub async fn get_primary_email(&self, record: &Record) -> Result<Value> {
        self.get_primary_field(record, ROLE_EMAIL).await
    }

    pub async fn get_primary_phone(&self, record: &Record) -> Result<Value> {
        self.get_primary_field(record, ROLE_PHONE).await
    }

    /// Display label: the name if non-empty, else the nameless placeholder,
    /// then rewritten by each label hook in order.
    pub fn label(&self, record: &Record) -> String {
        let label = match record.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.config.nameless_label_for(record.id),
        };
        self.hooks.apply(record, label)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    async fn schema(&self, bundle: &str) -> Result<BundleSchema> {
        self.registry
            .schema(bundle)
            .await
            .ok_or_else(|| RecordError::UnknownBundle {
                bundle: bundle.to_string(),
            })
    }

    async fn check_owner(&self, owner: &OwnerId) -> Result<()> {
        let exists = self
            .guarded("owner_exists", self.owners.owner_exists(owner))
            .await?;
        if exists {
            Ok(())
        } else {
            Err(RecordError::UnknownOwner {
                owner: owner.to_string(),
            })
        }
    }

    async fn ensure_live(&self, id: RecordId) -> Result<()> {
        if self
            .guarded("is_deleted", self.store.is_deleted(id))
            .await?
        {
            return Err(RecordError::AlreadyDeleted { id });
        }
        Ok(())
    }

    async fn load_live(&self, id: RecordId) -> Result<Record> {
        self.ensure_live(id).await?;
        self.guarded("load_latest_revision", self.store.load_latest_revision(id))
            .await
    }

    /// Copy of `current` as the next revision, with `changed_at` refreshed.
    fn next_revision(&self, current: &Record) -> Record {
        let mut next = current.clone();
        next.revision_id = current.revision_id.next();
        next.changed_at = Utc::now().max(current.changed_at);
        next
    }

    /// Take the write lock for `id`. The map entry is dropped with the last guard.
    async fn lock_record(&self, id: RecordId) -> RecordLock<'_> {
        let lock = self.locks.entry(id).or_default().clone();
        let guard = lock.lock_owned().await;
        RecordLock {
            locks: &self.locks,
            id,
            guard: Some(guard),
        }
    }

    async fn guarded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = StoreResult<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.storage_timeout(), call).await {
            Ok(result) => result.map_err(RecordError::from),
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.config.storage_timeout_ms,
                    "storage call timed out"
                );
                Err(RecordError::StorageUnavailable {
                    operation,
                    timeout_ms: self.config.storage_timeout_ms,
                })
            }
        }
    }
}
