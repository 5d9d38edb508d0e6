//! Durability backends for the key/value engine.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::Snapshot;
use crate::error::{GatewayError, GatewayResult};

/// Where committed snapshots live.
///
/// `persist` must not return until the snapshot survives a crash; the
/// engine publishes the new app hash only after it succeeds.
pub trait StateStore: Send + Sync {
    fn load(&self) -> GatewayResult<Option<Snapshot>>;
    fn persist(&self, snapshot: &Snapshot) -> GatewayResult<()>;
}

/// Process-local store. Clones share the same slot, so a test can drop an
/// engine and reopen a new one over the same "disk".
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<Snapshot>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> GatewayResult<Option<Snapshot>> {
        Ok(self.slot.lock().clone())
    }

    fn persist(&self, snapshot: &Snapshot) -> GatewayResult<()> {
        *self.slot.lock() = Some(snapshot.clone());
        Ok(())
    }
}

/// JSON file store with write-to-temp-then-rename replacement.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> GatewayResult<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| GatewayError::Storage(format!("read {}: {}", self.path.display(), e)))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| GatewayError::Corrupted(format!("{}: {}", self.path.display(), e)))
    }

    fn persist(&self, snapshot: &Snapshot) -> GatewayResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                GatewayError::Storage(format!("create {}: {}", parent.display(), e))
            })?;
        }

        let bytes = serde_json::to_vec(snapshot)
            .map_err(|e| GatewayError::Storage(format!("encode snapshot: {}", e)))?;

        let tmp = self.temp_path();
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| GatewayError::Storage(format!("write {}: {}", self.path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CommittedState, PendingBlock};
    use tempfile::tempdir;

    fn sample_snapshot() -> Snapshot {
        let mut block = PendingBlock::new(1);
        block.put(b"k".to_vec(), b"v".to_vec());
        CommittedState::genesis().apply(&block).to_snapshot()
    }

    #[test]
    fn test_memory_store_clones_share_slot() {
        let store = MemoryStore::new();
        let other = store.clone();
        assert!(other.load().unwrap().is_none());
        store.persist(&sample_snapshot()).unwrap();
        assert_eq!(other.load().unwrap(), Some(sample_snapshot()));
    }

    #[test]
    fn test_json_store_missing_file_is_fresh() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("application.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_json_store_persist_and_load() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data").join("application.json"));
        store.persist(&sample_snapshot()).unwrap();
        assert!(!store.temp_path().exists());
        assert_eq!(store.load().unwrap(), Some(sample_snapshot()));
    }

    #[test]
    fn test_json_store_garbage_is_corrupted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("application.json");
        fs::write(&path, b"not json").unwrap();
        let store = JsonFileStore::new(path);
        assert!(matches!(store.load(), Err(GatewayError::Corrupted(_))));
    }
}
