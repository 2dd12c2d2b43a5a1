//! Bundle configuration storage.
//!
//! The registry keeps its working set in memory and persists every change
//! through a [`BundleConfigStore`]. Two backends ship with the crate: YAML
//! files on disk and a plain in-memory map.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::error::Result;
use crate::types::{validate_name, BundleDef, FieldDef};

/// Persistence for bundle definitions and field definitions.
#[async_trait]
pub trait BundleConfigStore: Send + Sync {
    /// Load one bundle by name. `None` if it was never saved.
    async fn load_bundle(&self, name: &str) -> Result<Option<BundleDef>>;

    /// Create or overwrite a bundle.
    async fn save_bundle(&self, def: &BundleDef) -> Result<()>;

    /// All stored bundles.
    async fn list_bundles(&self) -> Result<Vec<BundleDef>>;

    /// All stored field definitions.
    async fn load_fields(&self) -> Result<Vec<FieldDef>>;

    /// Create or overwrite a field definition.
    async fn save_field(&self, def: &FieldDef) -> Result<()>;
}

/// YAML-on-disk bundle config.
///
/// ```text
/// <root>/
///   bundles/   ← one .yaml per bundle
///   fields/    ← one .yaml per field definition
/// ```
#[derive(Debug, Clone)]
pub struct YamlBundleStore {
    root: PathBuf,
}

impl YamlBundleStore {
    /// Open (and create if missing) a bundle config directory.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("bundles")).await?;
        fs::create_dir_all(root.join("fields")).await?;
        debug!(root = %root.display(), "bundle config store opened");
        Ok(Self { root })
    }

    /// The root directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bundle_path(&self, name: &str) -> Result<PathBuf> {
        validate_name("bundle", name)?;
        Ok(self.root.join("bundles").join(format!("{name}.yaml")))
    }

    fn field_path(&self, name: &str) -> Result<PathBuf> {
        validate_name("field", name)?;
        Ok(self.root.join("fields").join(format!("{name}.yaml")))
    }
}

#[async_trait]
impl BundleConfigStore for YamlBundleStore {
    async fn load_bundle(&self, name: &str) -> Result<Option<BundleDef>> {
        let path = self.bundle_path(name)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await?;
        Ok(Some(serde_yaml_ng::from_str(&content)?))
    }

    async fn save_bundle(&self, def: &BundleDef) -> Result<()> {
        let path = self.bundle_path(&def.name)?;
        let yaml = serde_yaml_ng::to_string(def)?;
        atomic_write(&path, yaml.as_bytes()).await?;
        Ok(())
    }

    async fn list_bundles(&self) -> Result<Vec<BundleDef>> {
        read_yaml_dir(&self.root.join("bundles")).await
    }

    async fn load_fields(&self) -> Result<Vec<FieldDef>> {
        read_yaml_dir(&self.root.join("fields")).await
    }

    async fn save_field(&self, def: &FieldDef) -> Result<()> {
        let path = self.field_path(&def.name)?;
        let yaml = serde_yaml_ng::to_string(def)?;
        atomic_write(&path, yaml.as_bytes()).await?;
        Ok(())
    }
}

/// Read every parseable .yaml file in a directory. Invalid files are skipped.
async fn read_yaml_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut out = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        let content = fs::read_to_string(&path).await?;
        match serde_yaml_ng::from_str::<T>(&content) {
            Ok(def) => out.push(def),
            Err(e) => {
                warn!(?path, %e, "skipping invalid bundle config file");
            }
        }
    }
    Ok(out)
}

/// Write to a temp file in the same directory, then rename over `path`.
///
/// Readers see either the old content or the new content, never a partial
/// write. The temp file is removed if the rename fails.
pub async fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "no parent dir"))?;
    let tmp = dir.join(format!(".tmp_{}", Ulid::new()));
    fs::write(&tmp, data).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        if let Err(cleanup) = fs::remove_file(&tmp).await {
            warn!(path = %tmp.display(), %cleanup, "failed to remove temp file");
        }
        return Err(e);
    }
    Ok(())
}

/// In-memory bundle config, for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryBundleStore {
    bundles: RwLock<BTreeMap<String, BundleDef>>,
    fields: RwLock<BTreeMap<String, FieldDef>>,
}

impl MemoryBundleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BundleConfigStore for MemoryBundleStore {
    async fn load_bundle(&self, name: &str) -> Result<Option<BundleDef>> {
        Ok(self.bundles.read().await.get(name).cloned())
    }

    async fn save_bundle(&self, def: &BundleDef) -> Result<()> {
        self.bundles
            .write()
            .await
            .insert(def.name.clone(), def.clone());
        Ok(())
    }

    async fn list_bundles(&self) -> Result<Vec<BundleDef>> {
        Ok(self.bundles.read().await.values().cloned().collect())
    }

    async fn load_fields(&self) -> Result<Vec<FieldDef>> {
        Ok(self.fields.read().await.values().cloned().collect())
    }

    async fn save_field(&self, def: &FieldDef) -> Result<()> {
        self.fields
            .write()
            .await
            .insert(def.name.clone(), def.clone());
        Ok(())
    }
}
