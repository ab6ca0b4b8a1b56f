//! Durable key-value slots holding serialized state.
//!
//! A slot plays the role of the browser's local storage: string keys mapping to
//! string values, with every write replacing the previous value wholesale.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Errors from a durable slot backend.
#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("Invalid slot key: {0:?}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Slot backend poisoned: {0}")]
    Poisoned(String),
}

/// The trait that all durable storage backends implement.
pub trait DurableSlot: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn read(&self, key: &str) -> Result<Option<String>, SlotError>;

    /// Replace the value stored under `key`.
    fn write(&self, key: &str, value: &str) -> Result<(), SlotError>;

    /// Remove `key`. Removing an absent key succeeds.
    fn remove(&self, key: &str) -> Result<(), SlotError>;
}

fn validate_key(key: &str) -> Result<(), SlotError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        && key != "."
        && key != "..";
    if valid {
        Ok(())
    } else {
        Err(SlotError::InvalidKey(key.to_string()))
    }
}

// MARK: - In-Memory Slot

/// Process-local slot. Clones share the same entries, like two tabs sharing
/// one browser profile.
#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DurableSlot for MemorySlot {
    fn read(&self, key: &str) -> Result<Option<String>, SlotError> {
        validate_key(key)?;
        let entries = self
            .entries
            .lock()
            .map_err(|e| SlotError::Poisoned(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SlotError> {
        validate_key(key)?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| SlotError::Poisoned(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SlotError> {
        validate_key(key)?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| SlotError::Poisoned(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

// MARK: - File Slot

/// Directory-backed slot: one file per key.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so readers only ever see a complete value.
#[derive(Debug, Clone)]
pub struct FileSlot {
    dir: PathBuf,
}

impl FileSlot {
    /// Open a slot directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SlotError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, SlotError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.slot", key)))
    }
}

impl DurableSlot for FileSlot {
    fn read(&self, key: &str) -> Result<Option<String>, SlotError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SlotError> {
        let path = self.path_for(key)?;
        let mut staged = tempfile::NamedTempFile::new_in(&self.dir)?;
        staged.write_all(value.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(&path).map_err(|e| SlotError::Io(e.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SlotError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
