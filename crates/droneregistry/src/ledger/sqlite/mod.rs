//! `SQLite`-backed ledger.
//!
//! Stores every ledger key as one row of a key/value table. The CLI uses it
//! as a local stand-in for the remote ledger so the registry can be driven
//! end to end without a network.

mod migrations;
mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, trace};

use super::{LedgerAccessor, LedgerError};
use crate::error::{Error, Result};

/// A ledger persisted in a local `SQLite` database.
#[derive(Debug)]
pub struct SqliteLedger {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open or create a ledger database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening ledger database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Ledger database opened at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory ledger for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Count stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn entry_count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count)
    }

    fn lock(&self) -> std::result::Result<MutexGuard<'_, Connection>, LedgerError> {
        self.conn
            .lock()
            .map_err(|_| LedgerError::backend("ledger connection lock poisoned"))
    }
}

fn backend(err: &rusqlite::Error) -> LedgerError {
    LedgerError::backend(err.to_string())
}

#[async_trait::async_trait]
impl LedgerAccessor for SqliteLedger {
    async fn get(&self, key: &str) -> super::Result<Vec<u8>> {
        let conn = self.lock()?;
        let value: Option<Vec<u8>> = conn
            .query_row("SELECT value FROM entries WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| backend(&e))?;

        trace!(key, found = value.is_some(), "sqlite ledger read");
        Ok(value.unwrap_or_default())
    }

    async fn set(&self, key: &str, value: &[u8]) -> super::Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r"
            INSERT INTO entries (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
            params![key, value, Utc::now().to_rfc3339()],
        )
        .map_err(|e| backend(&e))?;

        trace!(key, len = value.len(), "sqlite ledger write");
        Ok(())
    }

    async fn is_available(&self) -> super::Result<bool> {
        let conn = self.lock()?;
        Ok(conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_ledger() -> SqliteLedger {
        SqliteLedger::open_in_memory().expect("failed to create test ledger")
    }

    #[tokio::test]
    async fn test_open_in_memory() {
        let ledger = create_test_ledger();
        assert_eq!(ledger.path().to_string_lossy(), ":memory:");
        assert!(ledger.is_available().await.unwrap());
        assert_eq!(ledger.entry_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_missing_is_empty() {
        let ledger = create_test_ledger();
        assert!(ledger.get("drone_keys").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_replaces_value() {
        let ledger = create_test_ledger();
        ledger.set("drone_keys", b"[]").await.unwrap();
        ledger.set("drone_keys", b"[\"a\"]").await.unwrap();

        assert_eq!(ledger.get("drone_keys").await.unwrap(), b"[\"a\"]");
        assert_eq!(ledger.entry_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_binary_values() {
        let ledger = create_test_ledger();
        let value = vec![0u8, 159, 146, 150, 255];
        ledger.set("raw", &value).await.unwrap();
        assert_eq!(ledger.get("raw").await.unwrap(), value);
    }

    #[tokio::test]
    async fn test_open_file_based_persists() {
        let db_path = std::env::temp_dir().join(format!(
            "droneregistry_ledger_test_{}.db",
            std::process::id()
        ));

        {
            let ledger = SqliteLedger::open(&db_path).unwrap();
            assert_eq!(ledger.path(), db_path);
            ledger.set("drone_a", b"{}").await.unwrap();
        }

        let reopened = SqliteLedger::open(&db_path).unwrap();
        assert_eq!(reopened.get("drone_a").await.unwrap(), b"{}");

        drop(reopened);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let nested_path = std::env::temp_dir().join(format!(
            "droneregistry_test_{}/nested/ledger.db",
            std::process::id()
        ));

        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }

        let ledger = SqliteLedger::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(ledger);
        if let Some(root) = nested_path.parent().and_then(Path::parent) {
            let _ = std::fs::remove_dir_all(root);
        }
    }
}
