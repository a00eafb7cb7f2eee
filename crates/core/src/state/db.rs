//! # Conclave Database
//!
//! Single SQLite database for archived conversations.
//! Live conversations are never read back from here; the archive is a
//! record of sessions that have ended.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Schema version for migrations
const SCHEMA_VERSION: i32 = 1;

/// Shared SQLite handle for the conversation archive
pub struct ConclaveDb {
    conn: Arc<Mutex<Connection>>,
}

impl ConclaveDb {
    /// Open or create the database at `path`
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(path.as_ref()).context("Failed to open conclave database")?;
        Self::from_connection(conn)
    }

    /// In-memory database, dropped with the handle
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Get a shared connection for use by other modules
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current_version < 1 {
            Self::migrate_v1(&conn)?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                [1],
            )?;
        }

        Ok(())
    }

    /// Migration to version 1 - archive schema
    fn migrate_v1(conn: &Connection) -> Result<()> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS conversation_archive (
                id TEXT PRIMARY KEY,
                conversation_type TEXT NOT NULL,
                phase TEXT NOT NULL,
                agents_consulted INTEGER NOT NULL DEFAULT 0,
                data TEXT NOT NULL,
                archived_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS document_versions (
                conversation_id TEXT NOT NULL,
                doc_type TEXT NOT NULL,
                version INTEGER NOT NULL,
                status TEXT NOT NULL,
                owner TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (conversation_id, doc_type, version)
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_archive_archived_at ON conversation_archive(archived_at)",
            [],
        )?;

        tracing::info!(
            "ConclaveDb initialized with schema version {}",
            SCHEMA_VERSION
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conclave.db");

        drop(ConclaveDb::open_at(&path).unwrap());
        let db = ConclaveDb::open_at(&path).unwrap();

        let conn = db.connection();
        let conn = conn.lock().unwrap();
        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }
}
