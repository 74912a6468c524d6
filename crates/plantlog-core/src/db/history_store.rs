//! Sync history store implementation

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::{SyncHistoryEntry, SyncOutcome, SyncType};

/// Trait for the append-only sync audit log
pub trait HistoryStore {
    /// Append one entry for a completed run; returns the stored entry.
    ///
    /// The outcome is derived from the error count, never supplied.
    #[allow(clippy::too_many_arguments)]
    fn append(
        &self,
        sync_type: SyncType,
        uploaded: u32,
        downloaded: u32,
        conflicts: u32,
        errors: &[String],
        started_at: i64,
        completed_at: i64,
    ) -> Result<SyncHistoryEntry>;

    /// Most recent entries, newest first
    fn list_recent(&self, limit: usize) -> Result<Vec<SyncHistoryEntry>>;

    /// Completion stamp of the latest fully successful run
    fn last_successful_at(&self) -> Result<Option<i64>>;
}

/// SQLite implementation of `HistoryStore`
pub struct SqliteHistoryStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteHistoryStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncHistoryEntry> {
        let sync_type: String = row.get(1)?;
        let outcome: String = row.get(2)?;
        let errors_text: String = row.get(6)?;

        let sync_type: SyncType = sync_type.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
        })?;
        let outcome: SyncOutcome = outcome.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
        })?;
        let errors: Vec<String> = serde_json::from_str(&errors_text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(SyncHistoryEntry {
            id: row.get(0)?,
            sync_type,
            outcome,
            uploaded: row.get(3)?,
            downloaded: row.get(4)?,
            conflicts: row.get(5)?,
            errors,
            started_at: row.get(7)?,
            completed_at: row.get(8)?,
        })
    }
}

impl HistoryStore for SqliteHistoryStore<'_> {
    #[allow(clippy::too_many_arguments)]
    fn append(
        &self,
        sync_type: SyncType,
        uploaded: u32,
        downloaded: u32,
        conflicts: u32,
        errors: &[String],
        started_at: i64,
        completed_at: i64,
    ) -> Result<SyncHistoryEntry> {
        let outcome = SyncOutcome::from_error_count(errors.len());
        let errors_text = serde_json::to_string(errors)?;

        self.conn.execute(
            "INSERT INTO sync_history (
                 sync_type, outcome, uploaded, downloaded, conflicts,
                 errors, started_at, completed_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                sync_type.as_str(),
                outcome.as_str(),
                uploaded,
                downloaded,
                conflicts,
                errors_text,
                started_at,
                completed_at,
            ],
        )?;

        Ok(SyncHistoryEntry {
            id: self.conn.last_insert_rowid(),
            sync_type,
            outcome,
            uploaded,
            downloaded,
            conflicts,
            errors: errors.to_vec(),
            started_at,
            completed_at,
        })
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<SyncHistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, sync_type, outcome, uploaded, downloaded, conflicts,
                    errors, started_at, completed_at
             FROM sync_history
             ORDER BY started_at DESC, id DESC
             LIMIT ?",
        )?;

        let entries = stmt
            .query_map(
                params![i64::try_from(limit).unwrap_or(i64::MAX)],
                Self::parse_entry,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    fn last_successful_at(&self) -> Result<Option<i64>> {
        let stamp: Option<i64> = self.conn.query_row(
            "SELECT MAX(completed_at) FROM sync_history WHERE outcome = 'success'",
            [],
            |row| row.get(0),
        )?;
        Ok(stamp)
    }
}
