//! Error types for the record service and its storage collaborator

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{RecordId, RevisionId};

/// Result type for record service operations
pub type Result<T> = std::result::Result<T, RecordError>;

/// Result type for record store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors reported by a `RecordStore`
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with this id
    #[error("record not found: {id}")]
    NotFound { id: RecordId },

    /// The record exists but not at this revision
    #[error("revision {revision} of record {id} not found")]
    RevisionNotFound { id: RecordId, revision: RevisionId },

    /// A revision with this number was already written
    #[error("revision {revision} of record {id} already exists")]
    Conflict { id: RecordId, revision: RevisionId },

    /// Stored data could not be read back
    #[error("corrupt record data at {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur in record service operations
#[derive(Debug, Error)]
pub enum RecordError {
    /// Bundle not registered
    #[error("unknown bundle: {bundle}")]
    UnknownBundle { bundle: String },

    /// Field not declared on the bundle
    #[error("unknown field '{field}' on bundle '{bundle}'")]
    UnknownField { bundle: String, field: String },

    /// Owner rejected by the owner resolver
    #[error("unknown owner: {owner}")]
    UnknownOwner { owner: String },

    /// A base field was given a value of the wrong shape
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// No record with this id
    #[error("record not found: {id}")]
    NotFound { id: RecordId },

    /// The record exists but not at this revision
    #[error("revision {revision} of record {id} not found")]
    RevisionNotFound { id: RecordId, revision: RevisionId },

    /// The record was deleted and accepts no further changes
    #[error("record already deleted: {id}")]
    AlreadyDeleted { id: RecordId },

    /// The bundle maps no field to this role
    #[error("no primary {role} field is configured for bundle '{bundle}'")]
    PrimaryFieldNotConfigured { bundle: String, role: String },

    /// Underlying storage failure
    #[error("storage error: {0}")]
    StorageError(#[source] StoreError),

    /// A storage or collaborator call exceeded its timeout
    #[error("storage unavailable: {operation} timed out after {timeout_ms}ms")]
    StorageUnavailable {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl RecordError {
    /// Create an unknown field error
    pub fn unknown_field(bundle: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            bundle: bundle.into(),
            field: field.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the caller may retry the same input.
    ///
    /// Only storage failures qualify; everything else is permanent for the input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StorageError(_) | Self::StorageUnavailable { .. }
        )
    }
}

impl From<StoreError> for RecordError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => Self::NotFound { id },
            StoreError::RevisionNotFound { id, revision } => Self::RevisionNotFound { id, revision },
            other => Self::StorageError(other),
        }
    }
}

impl From<figment::Error> for RecordError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RecordError::PrimaryFieldNotConfigured {
            bundle: "person".into(),
            role: "email".into(),
        };
        assert_eq!(
            err.to_string(),
            "no primary email field is configured for bundle 'person'"
        );
    }

    #[test]
    fn store_not_found_maps_to_not_found() {
        let err: RecordError = StoreError::NotFound { id: RecordId(7) }.into();
        assert!(matches!(err, RecordError::NotFound { id: RecordId(7) }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn conflict_is_retryable_storage_error() {
        let err: RecordError = StoreError::Conflict {
            id: RecordId(1),
            revision: RevisionId(2),
        }
        .into();
        assert!(matches!(err, RecordError::StorageError(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn only_storage_errors_are_retryable() {
        let timeout = RecordError::StorageUnavailable {
            operation: "save_revision",
            timeout_ms: 10,
        };
        assert!(timeout.is_retryable());
        assert!(!RecordError::AlreadyDeleted { id: RecordId(1) }.is_retryable());
        assert!(!RecordError::unknown_field("person", "fax").is_retryable());
    }
}
