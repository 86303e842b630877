//! `SystemStore` trait: the persistence seam for the owner's system.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::system::System;

/// Backend-agnostic persistence for the single system.
#[async_trait]
pub trait SystemStore: Send + Sync {
    /// Persist the full system, replacing whatever was stored before.
    async fn save(&self, system: &System) -> Result<(), StoreError>;

    /// Load the system owned by `owner_id`.
    ///
    /// Returns `Ok(None)` when nothing is stored or when the stored system
    /// belongs to someone else.
    async fn load(&self, owner_id: &str) -> Result<Option<System>, StoreError>;
}
