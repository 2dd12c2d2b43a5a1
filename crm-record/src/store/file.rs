//! JSON-file record store.
//!
//! ```text
//! <root>/
//!   next_id                 ← id counter
//!   records/
//!     {id}/
//!       {revision}.json     ← one file per revision, never rewritten
//!       deleted             ← marker, present once the record is deleted
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use crm_fields::atomic_write;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use ulid::Ulid;

use super::RecordStore;
use crate::error::{StoreError, StoreResult};
use crate::types::{Record, RecordId, RevisionId};

/// Stores each revision as its own JSON file.
#[derive(Debug)]
pub struct FileRecordStore {
    root: PathBuf,
    id_lock: Mutex<()>,
}

impl FileRecordStore {
    /// Open (and create if missing) a record directory.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("records")).await?;
        debug!(root = %root.display(), "file record store opened");
        Ok(Self {
            root,
            id_lock: Mutex::new(()),
        })
    }

    /// The root directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn counter_path(&self) -> PathBuf {
        self.root.join("next_id")
    }

    fn record_dir(&self, id: RecordId) -> PathBuf {
        self.root.join("records").join(id.to_string())
    }

    fn revision_path(&self, id: RecordId, revision: RevisionId) -> PathBuf {
        self.record_dir(id).join(format!("{revision}.json"))
    }

    fn deleted_marker(&self, id: RecordId) -> PathBuf {
        self.record_dir(id).join("deleted")
    }

    fn ensure_exists(&self, id: RecordId) -> StoreResult<PathBuf> {
        let dir = self.record_dir(id);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(StoreError::NotFound { id })
        }
    }

    async fn read_revision(&self, path: &Path) -> StoreResult<Record> {
        let content = fs::read_to_string(path).await?;
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn allocate_id(&self) -> StoreResult<RecordId> {
        let _guard = self.id_lock.lock().await;
        let path = self.counter_path();
        let next = match fs::read_to_string(&path).await {
            Ok(content) => content.trim().parse::<u64>().map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => 1,
            Err(e) => return Err(e.into()),
        };
        atomic_write(&path, (next + 1).to_string().as_bytes()).await?;
        Ok(RecordId(next))
    }

    async fn load_latest_revision(&self, id: RecordId) -> StoreResult<Record> {
        let latest = self
            .list_revisions(id)
            .await?
            .pop()
            .ok_or(StoreError::NotFound { id })?;
        self.read_revision(&self.revision_path(id, latest)).await
    }

    async fn load_revision(&self, id: RecordId, revision: RevisionId) -> StoreResult<Record> {
        self.ensure_exists(id)?;
        let path = self.revision_path(id, revision);
        if !path.exists() {
            return Err(StoreError::RevisionNotFound { id, revision });
        }
        self.read_revision(&path).await
    }

    async fn list_revisions(&self, id: RecordId) -> StoreResult<Vec<RevisionId>> {
        let dir = self.ensure_exists(id)?;
        let mut revisions = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(rev) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            {
                revisions.push(RevisionId(rev));
            }
        }
        revisions.sort();
        Ok(revisions)
    }

    async fn save_revision(&self, record: &Record) -> StoreResult<()> {
        let dir = self.record_dir(record.id);
        fs::create_dir_all(&dir).await?;

        let json = serde_json::to_vec_pretty(record)?;
        let tmp = dir.join(format!(".tmp_{}", Ulid::new()));
        fs::write(&tmp, &json).await?;

        // hard_link refuses to replace an existing file, so a revision is written at most once.
        let path = self.revision_path(record.id, record.revision_id);
        let linked = fs::hard_link(&tmp, &path).await;
        if let Err(e) = fs::remove_file(&tmp).await {
            warn!(path = %tmp.display(), %e, "failed to remove temp file");
        }
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StoreError::Conflict {
                id: record.id,
                revision: record.revision_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn mark_deleted(&self, id: RecordId) -> StoreResult<()> {
        self.ensure_exists(id)?;
        fs::write(self.deleted_marker(id), b"").await?;
        Ok(())
    }

    async fn is_deleted(&self, id: RecordId) -> StoreResult<bool> {
        self.ensure_exists(id)?;
        Ok(self.deleted_marker(id).exists())
    }
}
