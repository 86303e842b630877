//! In-memory backend for tests and dry runs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::SystemStore;
use crate::system::System;

/// Keeps the last saved system in memory. Can be told to fail saves.
#[derive(Default)]
pub struct MemoryStore {
    saved: RwLock<Option<System>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed with a stored system.
    pub fn with_system(system: System) -> Self {
        Self {
            saved: RwLock::new(Some(system)),
            ..Default::default()
        }
    }

    /// Make subsequent saves fail with an IO error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// The last saved system.
    pub async fn snapshot(&self) -> Option<System> {
        self.saved.read().await.clone()
    }
}

#[async_trait]
impl SystemStore for MemoryStore {
    async fn save(&self, system: &System) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: "memory".into(),
                source: std::io::Error::other("save disabled"),
            });
        }
        *self.saved.write().await = Some(system.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, owner_id: &str) -> Result<Option<System>, StoreError> {
        Ok(self
            .saved
            .read()
            .await
            .as_ref()
            .filter(|s| s.owner_id == owner_id)
            .cloned())
    }
}
