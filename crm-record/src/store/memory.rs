//! In-process record store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::RecordStore;
use crate::error::{StoreError, StoreResult};
use crate::types::{Record, RecordId, RevisionId};

#[derive(Debug, Default)]
struct Entry {
    revisions: BTreeMap<RevisionId, Record>,
    deleted: bool,
}

/// Keeps every revision in memory. Nothing survives the process.
#[derive(Debug)]
pub struct MemoryRecordStore {
    next_id: AtomicU64,
    records: RwLock<HashMap<RecordId, Entry>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn allocate_id(&self) -> StoreResult<RecordId> {
        Ok(RecordId(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn load_latest_revision(&self, id: RecordId) -> StoreResult<Record> {
        let records = self.records.read().await;
        records
            .get(&id)
            .and_then(|entry| entry.revisions.values().next_back())
            .cloned()
            .ok_or(StoreError::NotFound { id })
    }

    async fn load_revision(&self, id: RecordId, revision: RevisionId) -> StoreResult<Record> {
        let records = self.records.read().await;
        let entry = records.get(&id).ok_or(StoreError::NotFound { id })?;
        entry
            .revisions
            .get(&revision)
            .cloned()
            .ok_or(StoreError::RevisionNotFound { id, revision })
    }

    async fn list_revisions(&self, id: RecordId) -> StoreResult<Vec<RevisionId>> {
        let records = self.records.read().await;
        let entry = records.get(&id).ok_or(StoreError::NotFound { id })?;
        Ok(entry.revisions.keys().copied().collect())
    }

    async fn save_revision(&self, record: &Record) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let entry = records.entry(record.id).or_default();
        if entry.revisions.contains_key(&record.revision_id) {
            return Err(StoreError::Conflict {
                id: record.id,
                revision: record.revision_id,
            });
        }
        entry.revisions.insert(record.revision_id, record.clone());
        Ok(())
    }

    async fn mark_deleted(&self, id: RecordId) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let entry = records.get_mut(&id).ok_or(StoreError::NotFound { id })?;
        entry.deleted = true;
        Ok(())
    }

    async fn is_deleted(&self, id: RecordId) -> StoreResult<bool> {
        let records = self.records.read().await;
        records
            .get(&id)
            .map(|entry| entry.deleted)
            .ok_or(StoreError::NotFound { id })
    }
}
