// SQLite-backed slots

use crate::backend::{Backend, validate_slot_name};
use chrono::Utc;
use eyre::{Context, Result};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use tracing::{debug, info};

/// Stores slots as rows of a single key-value table
pub struct SqliteBackend {
    db: Connection,
}

impl SqliteBackend {
    /// Open or create a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let db = Connection::open(path).context("Failed to open SQLite database")?;
        info!(path = ?path, "Opened SQLite backend");
        Self::with_connection(db)
    }

    /// Database that lives only as long as this value
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::with_connection(db)
    }

    fn with_connection(db: Connection) -> Result<Self> {
        let backend = Self { db };
        backend.create_schema()?;
        Ok(backend)
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating database schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS slots (
                slot TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    /// When the slot was last replaced, in milliseconds since the epoch
    pub fn updated_at(&self, slot: &str) -> Result<Option<i64>> {
        let updated_at = self
            .db
            .query_row("SELECT updated_at FROM slots WHERE slot = ?1", [slot], |row| row.get(0))
            .optional()?;
        Ok(updated_at)
    }
}

impl Backend for SqliteBackend {
    fn read(&self, slot: &str) -> Result<Option<String>> {
        let value = self
            .db
            .query_row("SELECT value FROM slots WHERE slot = ?1", [slot], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .context("Failed to read slot")?;
        Ok(value)
    }

    fn replace(&mut self, slot: &str, blob: &str) -> Result<()> {
        validate_slot_name(slot)?;

        let tx = self.db.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO slots (slot, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![slot, blob, Utc::now().timestamp_millis()],
        )?;
        tx.commit()?;

        debug!(slot, bytes = blob.len(), "Replaced slot row");
        Ok(())
    }

    fn update(&mut self, slot: &str, f: &mut dyn FnMut(Option<String>) -> Result<Option<String>>) -> Result<()> {
        validate_slot_name(slot)?;

        // IMMEDIATE takes the write lock before the read
        let tx = self.db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = tx
            .query_row("SELECT value FROM slots WHERE slot = ?1", [slot], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .context("Failed to read slot")?;

        let Some(blob) = f(current)? else {
            // dropping the transaction rolls it back
            return Ok(());
        };

        tx.execute(
            "INSERT OR REPLACE INTO slots (slot, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![slot, blob, Utc::now().timestamp_millis()],
        )?;
        tx.commit()?;

        debug!(slot, bytes = blob.len(), "Updated slot row");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_database() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store").join("taskboard.db");

        let _backend = SqliteBackend::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_read_missing_slot() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        assert_eq!(backend.read("tasks").unwrap(), None);
        assert_eq!(backend.updated_at("tasks").unwrap(), None);
    }

    #[test]
    fn test_replace_overwrites() {
        let mut backend = SqliteBackend::open_in_memory().unwrap();

        backend.replace("tasks", "[1]").unwrap();
        backend.replace("tasks", "[1,2]").unwrap();

        assert_eq!(backend.read("tasks").unwrap().as_deref(), Some("[1,2]"));
        assert!(backend.updated_at("tasks").unwrap().is_some());
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("taskboard.db");

        {
            let mut backend = SqliteBackend::open(&path).unwrap();
            backend.replace("tasks", "[]").unwrap();
        }

        let backend = SqliteBackend::open(&path).unwrap();
        assert_eq!(backend.read("tasks").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_update_reads_and_writes_in_one_transaction() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("taskboard.db");
        let mut backend = SqliteBackend::open(&path).unwrap();
        backend.replace("tasks", "[1]").unwrap();
        let other = SqliteBackend::open(&path).unwrap();
        other.db.busy_timeout(Duration::ZERO).unwrap();

        backend
            .update("tasks", &mut |current| {
                // a second connection cannot start writing meanwhile
                assert!(other.db.execute_batch("BEGIN IMMEDIATE; COMMIT;").is_err());
                Ok(current.map(|blob| blob.replace(']', ",2]")))
            })
            .unwrap();

        assert_eq!(backend.read("tasks").unwrap().as_deref(), Some("[1,2]"));
        assert_eq!(other.read("tasks").unwrap().as_deref(), Some("[1,2]"));
    }

    #[test]
    fn test_update_none_rolls_back() {
        let mut backend = SqliteBackend::open_in_memory().unwrap();
        backend.replace("tasks", "[1]").unwrap();

        backend.update("tasks", &mut |_| Ok(None)).unwrap();
        assert!(backend.update("tasks", &mut |_| Err(eyre::eyre!("nope"))).is_err());

        assert_eq!(backend.read("tasks").unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn test_rejects_invalid_slot_name() {
        let mut backend = SqliteBackend::open_in_memory().unwrap();
        assert!(backend.replace("bad slot", "[]").is_err());
    }
}
