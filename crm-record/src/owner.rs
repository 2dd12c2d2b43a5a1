//! Owner collaborator.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::OwnerId;

/// Validates owner ids against an account store.
///
/// `Ok(false)` means the owner does not exist. An `Err` means the account
/// store could not answer and surfaces to the caller as a retryable
/// storage error.
#[async_trait]
pub trait OwnerResolver: Send + Sync {
    async fn owner_exists(&self, owner: &OwnerId) -> StoreResult<bool>;
}

/// Accepts any non-blank owner id.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnyOwner;

#[async_trait]
impl OwnerResolver for AnyOwner {
    async fn owner_exists(&self, owner: &OwnerId) -> StoreResult<bool> {
        Ok(!owner.as_str().trim().is_empty())
    }
}

/// Accepts only the listed owner ids.
#[derive(Debug, Default, Clone)]
pub struct KnownOwners {
    owners: HashSet<OwnerId>,
}

impl KnownOwners {
    pub fn new<I, O>(owners: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<OwnerId>,
    {
        Self {
            owners: owners.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl OwnerResolver for KnownOwners {
    async fn owner_exists(&self, owner: &OwnerId) -> StoreResult<bool> {
        Ok(self.owners.contains(owner))
    }
}
