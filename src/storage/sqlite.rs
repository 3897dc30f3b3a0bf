//! SQLite-backed key-value store

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use super::{KeyValueStore, StorageError};

pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the session database under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| StorageError::Backend(format!("creating {}: {e}", data_dir.display())))?;
        let db_path = data_dir.join("session.db");
        let db = Connection::open(&db_path)?;

        db.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(&db)?;

        info!(path = %db_path.display(), "Session store initialized");
        Ok(Self { db: Mutex::new(db) })
    }

    /// In-memory database, same schema.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let db = Connection::open_in_memory()?;
        Self::init(&db)?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn init(db: &Connection) -> Result<(), StorageError> {
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            );",
        )?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let db = self.db.lock().map_err(|_| StorageError::Poisoned)?;
        let mut stmt = db.prepare_cached("SELECT value FROM kv WHERE key = ?1")?;
        let value = stmt
            .query_row([key], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(value)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let db = self.db.lock().map_err(|_| StorageError::Poisoned)?;
        db.execute(
            "INSERT INTO kv (key, value, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now'))
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = strftime('%s', 'now')",
            rusqlite::params![key, value],
        )?;
        debug!(key, "Saved session entry");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let db = self.db.lock().map_err(|_| StorageError::Poisoned)?;
        db.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        debug!(key, "Removed session entry");
        Ok(())
    }
}
