//! Error types for the record type registry

use thiserror::Error;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur in registry and bundle config operations
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Bundle not registered
    #[error("bundle not found: {name}")]
    BundleNotFound { name: String },

    /// Bundle or field name that cannot be stored
    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}
