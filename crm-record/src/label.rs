//! Label hooks.
//!
//! A record's label is computed by the service and then passed through every
//! registered hook in registration order. Hooks run synchronously on the
//! caller's task, so they must be cheap, non-blocking transforms.

use std::fmt;
use std::sync::Arc;

use crate::types::Record;

/// Rewrites a computed record label.
pub trait LabelHook: Send + Sync {
    fn alter_label(&self, record: &Record, label: String) -> String;
}

impl<F> LabelHook for F
where
    F: Fn(&Record, String) -> String + Send + Sync,
{
    fn alter_label(&self, record: &Record, label: String) -> String {
        self(record, label)
    }
}

/// Ordered list of label hooks, injected into the service at construction.
#[derive(Clone, Default)]
pub struct LabelHooks {
    hooks: Vec<Arc<dyn LabelHook>>,
}

impl LabelHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook. It runs after every hook registered before it.
    pub fn register(&mut self, hook: impl LabelHook + 'static) {
        self.hooks.push(Arc::new(hook));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, hook: impl LabelHook + 'static) -> Self {
        self.register(hook);
        self
    }

    /// Append a closure hook.
    pub fn with_fn<F>(self, hook: F) -> Self
    where
        F: Fn(&Record, String) -> String + Send + Sync + 'static,
    {
        self.with(hook)
    }

    /// Run every hook over `label`.
    pub fn apply(&self, record: &Record, label: String) -> String {
        self.hooks
            .iter()
            .fold(label, |label, hook| hook.alter_label(record, label))
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl fmt::Debug for LabelHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelHooks")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldMap, OwnerId, RecordId, RevisionId};
    use chrono::Utc;
    use ulid::Ulid;

    fn record() -> Record {
        let now = Utc::now();
        Record {
            id: RecordId(42),
            revision_id: RevisionId::FIRST,
            uuid: Ulid::new(),
            bundle: "person".into(),
            name: Some("Acme Corp".into()),
            owner: OwnerId::new("admin"),
            langcode: "und".into(),
            created_at: now,
            changed_at: now,
            fields: FieldMap::new(),
        }
    }

    struct Suffix(&'static str);

    impl LabelHook for Suffix {
        fn alter_label(&self, _record: &Record, label: String) -> String {
            format!("{label}{}", self.0)
        }
    }

    #[test]
    fn no_hooks_is_identity() {
        let hooks = LabelHooks::new();
        assert!(hooks.is_empty());
        assert_eq!(hooks.apply(&record(), "Acme Corp".into()), "Acme Corp");
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let hooks = LabelHooks::new()
            .with_fn(|_, label| label.to_uppercase())
            .with(Suffix(" (x)"));
        assert_eq!(hooks.len(), 2);
        assert_eq!(hooks.apply(&record(), "acme".into()), "ACME (x)");

        let reversed = LabelHooks::new()
            .with(Suffix(" (x)"))
            .with_fn(|_, label| label.to_uppercase());
        assert_eq!(reversed.apply(&record(), "acme".into()), "ACME (X)");
    }

    #[test]
    fn hooks_see_the_record() {
        let hooks = LabelHooks::new().with_fn(|record, label| format!("[{}] {label}", record.bundle));
        assert_eq!(hooks.apply(&record(), "Acme".into()), "[person] Acme");
    }
}
