//! RecordTypeRegistry — resolves bundles, their schemas and primary fields.
//!
//! Keeps every bundle and field definition in memory for lookups and writes
//! changes through to a [`BundleConfigStore`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{RegistryError, Result};
use crate::store::BundleConfigStore;
use crate::types::{validate_name, BundleDef, BundleSchema, FieldDef};

/// Default bundles and field definitions seeded into an empty store.
///
/// Consumers build this to pass to `RegistryBuilder::with_defaults()`.
/// On build, defaults that don't already exist in the store are written.
#[derive(Debug, Default)]
pub struct RegistryDefaults {
    fields: Vec<FieldDef>,
    bundles: Vec<BundleDef>,
}

impl RegistryDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a default field definition.
    pub fn field(mut self, def: FieldDef) -> Self {
        self.fields.push(def);
        self
    }

    /// Add a default bundle.
    pub fn bundle(mut self, def: BundleDef) -> Self {
        self.bundles.push(def);
        self
    }
}

/// Builder for `RecordTypeRegistry`. Created by `RecordTypeRegistry::open()`.
pub struct RegistryBuilder {
    store: Arc<dyn BundleConfigStore>,
    defaults: Option<RegistryDefaults>,
}

impl RegistryBuilder {
    /// Provide default bundles and fields.
    /// Defaults are seeded on first open; existing definitions are preserved.
    pub fn with_defaults(mut self, defaults: RegistryDefaults) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Seed defaults, then load everything from the store.
    pub async fn build(self) -> Result<RecordTypeRegistry> {
        if let Some(defaults) = &self.defaults {
            seed_defaults(self.store.as_ref(), defaults).await?;
        }

        let bundles: HashMap<_, _> = self
            .store
            .list_bundles()
            .await?
            .into_iter()
            .map(|def| (def.name.clone(), def))
            .collect();
        let fields: HashMap<_, _> = self
            .store
            .load_fields()
            .await?
            .into_iter()
            .map(|def| (def.name.clone(), def))
            .collect();

        debug!(
            bundles = bundles.len(),
            fields = fields.len(),
            "record type registry opened"
        );

        Ok(RecordTypeRegistry {
            store: self.store,
            state: RwLock::new(State { bundles, fields }),
        })
    }
}

/// Seed default definitions that don't already exist in the store.
///
/// Both bundles and fields are matched by name.
async fn seed_defaults(store: &dyn BundleConfigStore, defaults: &RegistryDefaults) -> Result<()> {
    let existing_fields: Vec<String> = store
        .load_fields()
        .await?
        .into_iter()
        .map(|f| f.name)
        .collect();

    for def in &defaults.fields {
        validate_name("field", &def.name)?;
        if !existing_fields.contains(&def.name) {
            store.save_field(def).await?;
            debug!(name = %def.name, "seeded default field");
        }
    }

    for def in &defaults.bundles {
        validate_name("bundle", &def.name)?;
        if store.load_bundle(&def.name).await?.is_none() {
            store.save_bundle(def).await?;
            debug!(name = %def.name, "seeded default bundle");
        }
    }

    Ok(())
}

#[derive(Debug, Default)]
struct State {
    bundles: HashMap<String, BundleDef>,
    fields: HashMap<String, FieldDef>,
}

/// Registry of record types (bundles) and their field schemas.
pub struct RecordTypeRegistry {
    store: Arc<dyn BundleConfigStore>,
    state: RwLock<State>,
}

impl RecordTypeRegistry {
    /// Open a registry over a bundle config store.
    ///
    /// ```rust,ignore
    /// let registry = RecordTypeRegistry::open(Arc::new(MemoryBundleStore::new()))
    ///     .with_defaults(my_defaults())
    ///     .build()
    ///     .await?;
    /// ```
    pub fn open(store: Arc<dyn BundleConfigStore>) -> RegistryBuilder {
        RegistryBuilder {
            store,
            defaults: None,
        }
    }

    // --- Primary fields ---

    /// Field name configured for `role` on `bundle`.
    ///
    /// `None` when the bundle is unknown or the role is unmapped. Never guesses.
    pub async fn get_primary_field_name(&self, bundle: &str, role: &str) -> Option<String> {
        let state = self.state.read().await;
        state
            .bundles
            .get(bundle)
            .and_then(|def| def.primary_field(role))
            .map(str::to_string)
    }

    /// Map `role` to `field` on `bundle` and persist the bundle.
    pub async fn set_primary_field_name(
        &self,
        bundle: &str,
        role: &str,
        field: &str,
    ) -> Result<()> {
        self.modify_bundle(bundle, |def| {
            def.primary_fields
                .insert(role.to_string(), field.to_string());
        })
        .await?;
        info!(bundle, role, field, "primary field mapped");
        Ok(())
    }

    /// Remove the mapping for `role` on `bundle` and persist the bundle.
    pub async fn clear_primary_field_name(&self, bundle: &str, role: &str) -> Result<()> {
        self.modify_bundle(bundle, |def| {
            def.primary_fields.remove(role);
        })
        .await?;
        info!(bundle, role, "primary field cleared");
        Ok(())
    }

    // --- Bundles ---

    /// Create or replace a bundle. Persists immediately.
    ///
    /// Fails with `InvalidName` when the name cannot be stored.
    pub async fn register_bundle(&self, def: BundleDef) -> Result<()> {
        validate_name("bundle", &def.name)?;
        let mut state = self.state.write().await;
        self.store.save_bundle(&def).await?;
        debug!(bundle = %def.name, fields = def.fields.len(), "bundle registered");
        state.bundles.insert(def.name.clone(), def);
        Ok(())
    }

    /// Get a bundle definition by name.
    pub async fn bundle(&self, name: &str) -> Option<BundleDef> {
        self.state.read().await.bundles.get(name).cloned()
    }

    /// Names of all registered bundles, sorted.
    pub async fn bundle_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.state.read().await.bundles.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve a bundle against the field definitions it declares.
    pub async fn schema(&self, name: &str) -> Option<BundleSchema> {
        let state = self.state.read().await;
        let bundle = state.bundles.get(name)?.clone();
        let fields: BTreeMap<_, _> = bundle
            .fields
            .iter()
            .filter_map(|f| state.fields.get(f).map(|def| (f.clone(), def.clone())))
            .collect();
        Some(BundleSchema { bundle, fields })
    }

    // --- Field definitions ---

    /// Create or replace a field definition. Persists immediately.
    pub async fn write_field(&self, def: FieldDef) -> Result<()> {
        validate_name("field", &def.name)?;
        let mut state = self.state.write().await;
        self.store.save_field(&def).await?;
        state.fields.insert(def.name.clone(), def);
        Ok(())
    }

    /// Get a field definition by name.
    pub async fn field(&self, name: &str) -> Option<FieldDef> {
        self.state.read().await.fields.get(name).cloned()
    }

    // --- Internal ---

    async fn modify_bundle(&self, bundle: &str, apply: impl FnOnce(&mut BundleDef)) -> Result<()> {
        let mut state = self.state.write().await;
        let mut def = state
            .bundles
            .get(bundle)
            .cloned()
            .ok_or_else(|| RegistryError::BundleNotFound {
                name: bundle.to_string(),
            })?;
        apply(&mut def);
        self.store.save_bundle(&def).await?;
        state.bundles.insert(def.name.clone(), def);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryBundleStore, YamlBundleStore};
    use crate::types::{FieldType, ROLE_ADDRESS, ROLE_EMAIL, ROLE_PHONE};
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_defaults() -> RegistryDefaults {
        RegistryDefaults::new()
            .field(FieldDef::new("email_address", FieldType::Email))
            .field(
                FieldDef::new("status", FieldType::Text { single_line: true })
                    .with_default(json!("lead")),
            )
            .bundle(
                BundleDef::new("person")
                    .field("email_address")
                    .field("status")
                    .primary(ROLE_EMAIL, "email_address"),
            )
    }

    async fn memory_registry() -> RecordTypeRegistry {
        RecordTypeRegistry::open(Arc::new(MemoryBundleStore::new()))
            .with_defaults(sample_defaults())
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn unmapped_roles_are_absent() {
        let registry = memory_registry().await;
        assert_eq!(
            registry.get_primary_field_name("person", ROLE_EMAIL).await,
            Some("email_address".to_string())
        );
        assert_eq!(registry.get_primary_field_name("person", ROLE_PHONE).await, None);
        assert_eq!(registry.get_primary_field_name("person", ROLE_ADDRESS).await, None);
        assert_eq!(registry.get_primary_field_name("missing", ROLE_EMAIL).await, None);
    }

    #[tokio::test]
    async fn set_primary_field_overwrites_and_persists() {
        let store = Arc::new(MemoryBundleStore::new());
        let registry = RecordTypeRegistry::open(store.clone())
            .with_defaults(sample_defaults())
            .build()
            .await
            .unwrap();

        registry
            .set_primary_field_name("person", ROLE_EMAIL, "work_email")
            .await
            .unwrap();
        registry
            .set_primary_field_name("person", ROLE_PHONE, "mobile")
            .await
            .unwrap();

        assert_eq!(
            registry.get_primary_field_name("person", ROLE_EMAIL).await,
            Some("work_email".to_string())
        );
        let stored = store.load_bundle("person").await.unwrap().unwrap();
        assert_eq!(stored.primary_field(ROLE_PHONE), Some("mobile"));
    }

    #[tokio::test]
    async fn set_primary_field_on_unknown_bundle_errors() {
        let registry = memory_registry().await;
        let err = registry
            .set_primary_field_name("organization", ROLE_EMAIL, "email")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::BundleNotFound { ref name } if name == "organization"));
    }

    #[tokio::test]
    async fn clear_primary_field_removes_mapping() {
        let registry = memory_registry().await;
        registry
            .clear_primary_field_name("person", ROLE_EMAIL)
            .await
            .unwrap();
        assert_eq!(registry.get_primary_field_name("person", ROLE_EMAIL).await, None);
    }

    #[tokio::test]
    async fn schema_resolves_declared_fields() {
        let registry = memory_registry().await;
        let schema = registry.schema("person").await.unwrap();
        assert_eq!(schema.name(), "person");
        assert!(schema.declares("status"));
        assert_eq!(
            schema.field_def("status").unwrap().default,
            Some(json!("lead"))
        );
        assert!(registry.schema("organization").await.is_none());
    }

    #[tokio::test]
    async fn register_bundle_is_listed() {
        let registry = memory_registry().await;
        registry
            .register_bundle(BundleDef::new("organization").field("website"))
            .await
            .unwrap();
        assert_eq!(
            registry.bundle_names().await,
            vec!["organization".to_string(), "person".to_string()]
        );
    }

    #[tokio::test]
    async fn unsafe_names_are_rejected_before_persisting() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("config");
        let store = Arc::new(YamlBundleStore::open(&root).await.unwrap());
        let registry = RecordTypeRegistry::open(store.clone())
            .build()
            .await
            .unwrap();

        for name in ["../../escaped", "a/b", ""] {
            let err = registry
                .register_bundle(BundleDef::new(name))
                .await
                .unwrap_err();
            assert!(
                matches!(err, RegistryError::InvalidName { kind: "bundle", .. }),
                "{name:?}: {err}"
            );
        }
        let err = registry
            .write_field(FieldDef::new("../phone", FieldType::Phone))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName { kind: "field", .. }));

        assert!(!tmp.path().join("escaped.yaml").exists());
        assert!(registry.bundle_names().await.is_empty());
        let reopened = RecordTypeRegistry::open(store).build().await.unwrap();
        assert!(reopened.bundle_names().await.is_empty());
    }

    #[tokio::test]
    async fn unsafe_default_names_fail_the_build() {
        let result = RecordTypeRegistry::open(Arc::new(MemoryBundleStore::new()))
            .with_defaults(RegistryDefaults::new().bundle(BundleDef::new("..")))
            .build()
            .await;
        assert!(matches!(result, Err(RegistryError::InvalidName { .. })));
    }

    #[tokio::test]
    async fn reopen_preserves_user_changes() {
        let tmp = TempDir::new().unwrap();

        {
            let store = Arc::new(YamlBundleStore::open(tmp.path()).await.unwrap());
            let registry = RecordTypeRegistry::open(store)
                .with_defaults(sample_defaults())
                .build()
                .await
                .unwrap();
            registry
                .set_primary_field_name("person", ROLE_EMAIL, "work_email")
                .await
                .unwrap();
        }

        let store = Arc::new(YamlBundleStore::open(tmp.path()).await.unwrap());
        let registry = RecordTypeRegistry::open(store)
            .with_defaults(sample_defaults())
            .build()
            .await
            .unwrap();

        assert_eq!(
            registry.get_primary_field_name("person", ROLE_EMAIL).await,
            Some("work_email".to_string())
        );
        assert!(registry.field("status").await.is_some());
    }

    #[tokio::test]
    async fn new_defaults_added_on_reopen() {
        let store = Arc::new(MemoryBundleStore::new());
        let _ = RecordTypeRegistry::open(store.clone())
            .with_defaults(sample_defaults())
            .build()
            .await
            .unwrap();

        let registry = RecordTypeRegistry::open(store)
            .with_defaults(sample_defaults().bundle(BundleDef::new("organization")))
            .build()
            .await
            .unwrap();

        assert_eq!(registry.bundle_names().await.len(), 2);
    }
}
