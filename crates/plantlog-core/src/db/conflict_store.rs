//! Conflict store implementation

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::{Collection, Record, SyncConflict};
use crate::remote::RemoteRecord;

/// Trait for the queue of divergences awaiting manual resolution
pub trait ConflictStore {
    /// Insert or replace the conflict for its local row.
    ///
    /// The composite key guarantees at most one open conflict per row; a
    /// repeat detection replaces the earlier snapshot pair.
    fn upsert(&self, conflict: &SyncConflict) -> Result<()>;

    /// Fetch a conflict by its composite id
    fn get(&self, conflict_id: &str) -> Result<Option<SyncConflict>>;

    /// All open conflicts, newest detection first
    fn list(&self) -> Result<Vec<SyncConflict>>;

    /// Remove a resolved conflict
    fn remove(&self, conflict_id: &str) -> Result<()>;

    /// Number of open conflicts
    fn count(&self) -> Result<u64>;
}

/// SQLite implementation of `ConflictStore`
pub struct SqliteConflictStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteConflictStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_conflict(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncConflict> {
        let collection: String = row.get(1)?;
        let local_text: String = row.get(3)?;
        let remote_text: String = row.get(4)?;

        let collection: Collection = collection.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
        })?;
        let local: Record = serde_json::from_str(&local_text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let remote: RemoteRecord = serde_json::from_str(&remote_text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(SyncConflict {
            id: row.get(0)?,
            collection,
            local_id: row.get(2)?,
            local,
            remote,
            detected_at: row.get(5)?,
        })
    }
}

impl ConflictStore for SqliteConflictStore<'_> {
    fn upsert(&self, conflict: &SyncConflict) -> Result<()> {
        let local_snapshot = serde_json::to_string(&conflict.local)?;
        let remote_snapshot = serde_json::to_string(&conflict.remote)?;

        self.conn.execute(
            "INSERT OR REPLACE INTO sync_conflicts (
                 id, collection, local_id, local_snapshot, remote_snapshot,
                 local_updated_at, remote_updated_at, detected_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                conflict.id,
                conflict.collection.as_str(),
                conflict.local_id,
                local_snapshot,
                remote_snapshot,
                conflict.local.updated_at,
                conflict.remote.updated_at,
                conflict.detected_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, conflict_id: &str) -> Result<Option<SyncConflict>> {
        let result = self.conn.query_row(
            "SELECT id, collection, local_id, local_snapshot, remote_snapshot, detected_at
             FROM sync_conflicts WHERE id = ?",
            params![conflict_id],
            Self::parse_conflict,
        );

        match result {
            Ok(conflict) => Ok(Some(conflict)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<SyncConflict>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, collection, local_id, local_snapshot, remote_snapshot, detected_at
             FROM sync_conflicts
             ORDER BY detected_at DESC, id DESC",
        )?;

        let conflicts = stmt
            .query_map([], Self::parse_conflict)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(conflicts)
    }

    fn remove(&self, conflict_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM sync_conflicts WHERE id = ?",
            params![conflict_id],
        )?;
        Ok(())
    }

    fn count(&self) -> Result<u64> {
        let count: u64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM sync_conflicts", [], |row| row.get(0))?;
        Ok(count)
    }
}
