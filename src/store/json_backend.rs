//! JSON file backend: one pretty-printed `system.json` under the data dir.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::store::SystemStore;
use crate::system::System;

/// File name of the persisted system.
pub const SYSTEM_FILE: &str = "system.json";

/// Stores the system as JSON on the local filesystem.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Full path of the system file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(SYSTEM_FILE)
    }

    fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl SystemStore for JsonFileStore {
    async fn save(&self, system: &System) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(Self::io_err(&self.dir))?;

        let json = serde_json::to_string_pretty(system)?;
        let path = self.path();
        let tmp = self.dir.join(format!("{SYSTEM_FILE}.tmp"));

        fs::write(&tmp, json).await.map_err(Self::io_err(&tmp))?;
        fs::rename(&tmp, &path).await.map_err(Self::io_err(&path))?;

        debug!(
            path = %path.display(),
            members = system.member_count(),
            "System saved to file"
        );
        Ok(())
    }

    async fn load(&self, owner_id: &str) -> Result<Option<System>, StoreError> {
        let path = self.path();
        let data = match fs::read_to_string(&path).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No system file found");
                return Ok(None);
            }
            Err(e) => return Err(Self::io_err(&path)(e)),
        };

        let mut system: System = serde_json::from_str(&data)?;

        if system.owner_id != owner_id {
            warn!(
                expected = owner_id,
                found = %system.owner_id,
                "System belongs to a different user"
            );
            return Ok(None);
        }

        let dropped = system.dedup_members();
        if dropped > 0 {
            warn!(dropped, "Dropped members with duplicate ids from system file");
        }

        info!(
            system = %system.name,
            members = system.member_count(),
            "Loaded system"
        );
        Ok(Some(system))
    }
}
