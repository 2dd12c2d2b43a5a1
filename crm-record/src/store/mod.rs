//! Storage collaborator for record revisions.
//!
//! The service never overwrites a revision: `save_revision` must refuse an
//! `(id, revision_id)` pair that already exists. Together with the service's
//! per-id lock this keeps revision numbers unique even when several service
//! instances share one store.

mod file;
mod memory;

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{Record, RecordId, RevisionId};

/// Persistence for records and their revisions.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Reserve a fresh record id. Ids are never reused.
    async fn allocate_id(&self) -> StoreResult<RecordId>;

    /// Highest revision of a record, deleted or not.
    async fn load_latest_revision(&self, id: RecordId) -> StoreResult<Record>;

    /// One specific revision.
    async fn load_revision(&self, id: RecordId, revision: RevisionId) -> StoreResult<Record>;

    /// All revision numbers of a record, ascending.
    async fn list_revisions(&self, id: RecordId) -> StoreResult<Vec<RevisionId>>;

    /// Write a new revision. Fails with `Conflict` if it already exists.
    async fn save_revision(&self, record: &Record) -> StoreResult<()>;

    /// Mark a record deleted. Fails with `NotFound` for unknown ids.
    async fn mark_deleted(&self, id: RecordId) -> StoreResult<()>;

    /// Whether a record is deleted. Fails with `NotFound` for unknown ids.
    async fn is_deleted(&self, id: RecordId) -> StoreResult<bool>;
}
