//! Session persistence - a flat key-value store
//!
//! Handles:
//! - Encrypted secrets (keystore, attached DAY account)
//! - Presence flags (claiming, scanning)
//! - Provider selection and economic-strategy parameters
//!
//! Every write is independent; a multi-key save is not atomic.

pub mod keys;
pub mod sqlite;

pub use sqlite::SqliteStore;

use std::collections::HashMap;
use std::sync::Mutex;

/// Errors from the persistence layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage lock poisoned")]
    Poisoned,
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

/// String keys to string values
pub trait KeyValueStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Presence flags are stored as `"true"`; absence means false.
    fn load_flag(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self
            .load(key)?
            .map(|v| !v.is_empty() && v != "false")
            .unwrap_or(false))
    }

    fn set_flag(&self, key: &str, value: bool) -> Result<(), StorageError> {
        if value {
            self.save(key, "true")
        } else {
            self.remove(key)
        }
    }
}

/// Volatile store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}
