//! Database connection management

use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;
use crate::models::Collection;

use super::migrations;

/// Wrapper around the embedded SQLite connection.
///
/// Opening runs migrations; all store types borrow the connection from here.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let database = Self { conn };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let database = Self { conn };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure SQLite pragmas.
    fn configure(&self) -> Result<()> {
        // journal_mode returns a row; ignore failures on memory databases
        self.conn
            .query_row("PRAGMA journal_mode = WAL", [], |_row| Ok(()))
            .ok();
        self.conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;
        Ok(())
    }

    /// Run database migrations.
    fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn)
    }

    /// Get a reference to the underlying connection.
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Aggregate per-collection counts and storage size, for diagnostics.
    pub fn info(&self) -> Result<StoreInfo> {
        let mut collections = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            let table = collection.table();
            let total: u64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {table} WHERE deleted_at IS NULL"),
                [],
                |row| row.get(0),
            )?;
            let pending: u64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {table} WHERE sync_status = 'pending'"),
                [],
                |row| row.get(0),
            )?;
            let conflicts: u64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {table} WHERE sync_status = 'conflict'"),
                [],
                |row| row.get(0),
            )?;
            collections.push(CollectionCounts {
                collection,
                total,
                pending,
                conflicts,
            });
        }

        let page_count: u64 = self
            .conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: u64 = self
            .conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))?;

        Ok(StoreInfo {
            collections,
            size_bytes: page_count * page_size,
        })
    }
}

/// Row counts for one collection.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionCounts {
    pub collection: Collection,
    /// Non-deleted rows
    pub total: u64,
    /// Rows awaiting push (including tombstones)
    pub pending: u64,
    /// Rows queued for manual resolution
    pub conflicts: u64,
}

/// Diagnostics snapshot of the local store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub collections: Vec<CollectionCounts>,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        let info = db.info().unwrap();
        assert_eq!(info.collections.len(), 3);
        assert!(info.collections.iter().all(|c| c.total == 0));
    }

    #[test]
    fn test_open_creates_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("plantlog.db");
        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        assert!(db.info().unwrap().size_bytes > 0);
    }
}
