//! Durable local state slots.
//!
//! Each slot holds one JSON-encoded value under a fixed key and is overwritten
//! wholesale on every change. Two slots are used: the in-progress assessment
//! and the assessment chat transcript.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};

/// Slot holding the in-progress responses and question index.
pub const ASSESSMENT_SLOT: &str = "assessment-store";
/// Slot holding the assessment chat transcript.
pub const CHAT_SLOT: &str = "chat-messages";

/// Raw key/value backend for state slots.
pub trait SlotStore: Send + Sync {
    /// Read the raw contents of a slot, if present.
    fn read(&self, key: &str) -> StorageResult<Option<String>>;
    /// Replace the contents of a slot.
    fn write(&self, key: &str, contents: &str) -> StorageResult<()>;
    /// Remove a slot. Removing a missing slot is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

impl dyn SlotStore {
    /// Load and decode a slot. Unreadable or undecodable contents are logged
    /// and reported as an empty slot.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.read(key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(slot = key, error = %e, "Failed to read state slot");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(slot = key, error = %e, "Discarding undecodable state slot");
                None
            }
        }
    }

    /// Encode and store a value, replacing the slot.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let contents = serde_json::to_string(value)?;
        self.write(key, &contents)
    }
}

/// Slots stored as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileSlotStore {
    dir: PathBuf,
}

impl FileSlotStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the slot files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl SlotStore for FileSlotStore {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.slot_path(key);
        if !path.exists() {
            return Ok(None);
        }

        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| StorageError::Slot {
                key: key.to_string(),
                message: format!("Failed to read {}: {}", path.display(), e),
            })
    }

    fn write(&self, key: &str, contents: &str) -> StorageResult<()> {
        let slot_error = |e: std::io::Error| StorageError::Slot {
            key: key.to_string(),
            message: e.to_string(),
        };

        fs::create_dir_all(&self.dir).map_err(slot_error)?;

        // Slots are replaced atomically
        let path = self.slot_path(key);
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        fs::write(&tmp, contents).map_err(slot_error)?;
        fs::rename(&tmp, &path).map_err(slot_error)?;

        debug!(slot = key, bytes = contents.len(), "State slot written");
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        match fs::remove_file(self.slot_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Slot {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// In-process slots, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemorySlotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SlotStore for MemorySlotStore {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn write(&self, key: &str, contents: &str) -> StorageResult<()> {
        self.lock().insert(key.to_string(), contents.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.lock().remove(key);
        Ok(())
    }
}
