//! SQLite database layer backing the persistent semantic index.
//!
//! Uses rusqlite with WAL mode. Async callers go through
//! `with_conn_async`, which runs the closure on the blocking pool.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::ConductorError;

/// Thread-safe handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(db_path: &str) -> Result<Self, ConductorError> {
        let path = Path::new(db_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(db_path)
            .map_err(|e| ConductorError::Database(format!("Failed to open database: {}", e)))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| ConductorError::Database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_tables()?;

        tracing::info!("[Database] SQLite index opened at: {}", db_path);
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, ConductorError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            ConductorError::Database(format!("Failed to open in-memory db: {}", e))
        })?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_tables()?;
        Ok(db)
    }

    /// Execute a closure with access to the database connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, ConductorError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConductorError::Database(format!("Lock poisoned: {}", e)))?;
        f(&conn).map_err(|e| ConductorError::Database(e.to_string()))
    }

    /// Execute a closure with access to the database connection (async-friendly).
    pub async fn with_conn_async<F, T>(&self, f: F) -> Result<T, ConductorError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.with_conn(f))
            .await
            .map_err(|e| ConductorError::Database(format!("Task join error: {}", e)))?
    }

    fn initialize_tables(&self) -> Result<(), ConductorError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS index_entries (
                    id              TEXT PRIMARY KEY,
                    workflow_id     TEXT NOT NULL,
                    agent_id        TEXT NOT NULL,
                    agent_role      TEXT,
                    item_type       TEXT NOT NULL,
                    content         TEXT NOT NULL,
                    confidence      REAL,
                    embedding       BLOB NOT NULL,
                    created_at      INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_index_entries_workflow ON index_entries(workflow_id);
                CREATE INDEX IF NOT EXISTS idx_index_entries_agent ON index_entries(workflow_id, agent_id);
                ",
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_index_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.db");
        let db = Database::open(path.to_str().unwrap()).unwrap();

        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM index_entries", [], |row| row.get(0))
            })
            .unwrap();
        assert_eq!(count, 0);
        assert!(path.exists());
    }
}
