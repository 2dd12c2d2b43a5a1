//! Record service configuration using Figment
//!
//! Sources are merged in precedence order (later sources override earlier ones):
//! 1. Default values
//! 2. An optional configuration file (TOML, YAML or JSON by extension)
//! 3. Environment variables with the `CRM_` prefix

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::types::RecordId;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "CRM_";

/// Placeholder replaced by the record id in [`RecordServiceConfig::nameless_label`].
pub const ID_PLACEHOLDER: &str = "{id}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordServiceConfig {
    /// Upper bound for every storage call, in milliseconds.
    pub storage_timeout_ms: u64,
    /// Label used for records without a name. `{id}` is replaced by the record id.
    pub nameless_label: String,
    /// Language code given to records created without one.
    pub default_langcode: String,
}

impl Default for RecordServiceConfig {
    fn default() -> Self {
        Self {
            storage_timeout_ms: 5_000,
            nameless_label: "Nameless #{id}".to_string(),
            default_langcode: "und".to_string(),
        }
    }
}

impl RecordServiceConfig {
    /// Load configuration from defaults, an optional file and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(file).extract()?;
        debug!(
            storage_timeout_ms = config.storage_timeout_ms,
            default_langcode = %config.default_langcode,
            "record service configuration loaded"
        );
        Ok(config)
    }

    /// The merged figment, before extraction.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => figment.merge(Yaml::file(path)),
            };
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }

    /// The placeholder label for a nameless record.
    pub fn nameless_label_for(&self, id: RecordId) -> String {
        self.nameless_label.replace(ID_PLACEHOLDER, &id.to_string())
    }
}
