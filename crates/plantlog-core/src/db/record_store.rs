//! Record store implementation

use chrono::Utc;
use rusqlite::{params, Connection, ToSql};

use crate::error::{Error, Result};
use crate::models::{Collection, ListFilter, NewRecord, Page, Record, RecordPatch, SyncStatus};

const COLUMNS: &str =
    "id, remote_id, payload, sync_status, last_synced_at, created_at, updated_at, deleted_at";

/// Trait for record storage operations, parameterized by collection
pub trait RecordStore {
    /// One page of non-deleted records, newest first
    fn list(&self, filter: &ListFilter, page: u32, per_page: u32) -> Result<Page<Record>>;

    /// Get a record by local id, excluding soft-deleted rows
    fn get_by_id(&self, local_id: i64) -> Result<Option<Record>>;

    /// Get a record by remote id, excluding soft-deleted rows
    fn get_by_remote_id(&self, remote_id: i64) -> Result<Option<Record>>;

    /// Create a record; returns the new local id
    fn create(&self, new: &NewRecord) -> Result<i64>;

    /// Merge the provided fields into a record; absent fields are preserved
    fn update(&self, local_id: i64, patch: &RecordPatch) -> Result<()>;

    /// Soft delete (hard delete for collections without tombstones)
    fn delete(&self, local_id: i64) -> Result<()>;

    /// Every pending row, including soft-deleted ones, without pagination
    fn list_pending(&self) -> Result<Vec<Record>>;
}

/// SQLite implementation of `RecordStore`
pub struct SqliteRecordStore<'a> {
    conn: &'a Connection,
    collection: Collection,
}

impl<'a> SqliteRecordStore<'a> {
    /// Create a store over the given connection and collection
    pub const fn new(conn: &'a Connection, collection: Collection) -> Self {
        Self { conn, collection }
    }

    pub const fn collection(&self) -> Collection {
        self.collection
    }

    /// Lookup by remote id including soft-deleted rows.
    ///
    /// The pull phase dedups against every local row so a tombstoned record
    /// is not re-created as a second copy of the same remote record.
    pub fn get_by_remote_id_any(&self, remote_id: i64) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE remote_id = ?",
            self.collection.table()
        );
        self.query_single(&sql, params![remote_id])
    }

    fn query_single(&self, sql: &str, sql_params: impl rusqlite::Params) -> Result<Option<Record>> {
        let result = self.conn.query_row(sql, sql_params, Self::parse_record);

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Parse a record from a database row
    fn parse_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
        let payload_text: String = row.get(2)?;
        let payload = serde_json::from_str(&payload_text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let status_text: String = row.get(3)?;
        let sync_status: SyncStatus = status_text.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
        })?;

        Ok(Record {
            id: row.get(0)?,
            remote_id: row.get(1)?,
            payload,
            sync_status,
            last_synced_at: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            deleted_at: row.get(7)?,
        })
    }

    /// Build WHERE clauses and owned parameters for a listing filter
    fn filter_clauses(filter: &ListFilter) -> (Vec<&'static str>, Vec<Box<dyn ToSql>>) {
        let mut clauses: Vec<&'static str> = vec!["deleted_at IS NULL"];
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            clauses.push("payload LIKE ?");
            values.push(Box::new(format!("%{}%", search.trim())));
        }
        if let Some(from) = filter.created_from {
            clauses.push("created_at >= ?");
            values.push(Box::new(from));
        }
        if let Some(to) = filter.created_to {
            clauses.push("created_at <= ?");
            values.push(Box::new(to));
        }

        (clauses, values)
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn list(&self, filter: &ListFilter, page: u32, per_page: u32) -> Result<Page<Record>> {
        if page == 0 {
            return Err(Error::InvalidInput("page must be >= 1".into()));
        }
        if per_page == 0 {
            return Err(Error::InvalidInput("per_page must be > 0".into()));
        }

        let (clauses, mut values) = Self::filter_clauses(filter);
        let where_sql = clauses.join(" AND ");
        let table = self.collection.table();

        let count_sql = format!("SELECT COUNT(*) FROM {table} WHERE {where_sql}");
        let refs: Vec<&dyn ToSql> = values.iter().map(AsRef::as_ref).collect();
        let total: u64 = self
            .conn
            .query_row(&count_sql, refs.as_slice(), |row| row.get(0))?;

        let last_page = u32::try_from(total.div_ceil(u64::from(per_page)))
            .unwrap_or(u32::MAX)
            .max(1);

        let list_sql = format!(
            "SELECT {COLUMNS} FROM {table}
             WHERE {where_sql}
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?"
        );
        values.push(Box::new(i64::from(per_page)));
        values.push(Box::new(i64::from(page - 1) * i64::from(per_page)));
        let refs: Vec<&dyn ToSql> = values.iter().map(AsRef::as_ref).collect();

        let mut stmt = self.conn.prepare(&list_sql)?;
        let data = stmt
            .query_map(refs.as_slice(), Self::parse_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Page {
            data,
            current_page: page,
            last_page,
            per_page,
            total,
        })
    }

    fn get_by_id(&self, local_id: i64) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE id = ? AND deleted_at IS NULL",
            self.collection.table()
        );
        self.query_single(&sql, params![local_id])
    }

    fn get_by_remote_id(&self, remote_id: i64) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE remote_id = ? AND deleted_at IS NULL",
            self.collection.table()
        );
        self.query_single(&sql, params![remote_id])
    }

    fn create(&self, new: &NewRecord) -> Result<i64> {
        let now = Utc::now().timestamp_millis();
        let payload = serde_json::to_string(&new.payload)?;
        let sync_status = new.sync_status.unwrap_or(SyncStatus::Pending);

        let sql = format!(
            "INSERT INTO {} (remote_id, payload, sync_status, last_synced_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            self.collection.table()
        );
        self.conn.execute(
            &sql,
            params![
                new.remote_id,
                payload,
                sync_status.as_str(),
                new.last_synced_at,
                new.created_at.unwrap_or(now),
                new.updated_at.unwrap_or(now),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, local_id: i64, patch: &RecordPatch) -> Result<()> {
        let now = Utc::now().timestamp_millis();

        let mut sets: Vec<&'static str> = vec!["updated_at = ?"];
        let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(patch.updated_at.unwrap_or(now))];

        if let Some(payload) = &patch.payload {
            sets.push("payload = ?");
            values.push(Box::new(serde_json::to_string(payload)?));
        }
        if let Some(remote_id) = patch.remote_id {
            sets.push("remote_id = ?");
            values.push(Box::new(remote_id));
        }
        if let Some(sync_status) = patch.sync_status {
            sets.push("sync_status = ?");
            values.push(Box::new(sync_status.as_str()));
        }
        if let Some(last_synced_at) = patch.last_synced_at {
            sets.push("last_synced_at = ?");
            values.push(Box::new(last_synced_at));
        }
        values.push(Box::new(local_id));

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            self.collection.table(),
            sets.join(", ")
        );
        let refs: Vec<&dyn ToSql> = values.iter().map(AsRef::as_ref).collect();
        let rows = self.conn.execute(&sql, refs.as_slice())?;

        if rows == 0 {
            return Err(Error::NotFound(format!(
                "{} record {local_id}",
                self.collection
            )));
        }

        Ok(())
    }

    fn delete(&self, local_id: i64) -> Result<()> {
        let now = Utc::now().timestamp_millis();

        let rows = if self.collection.uses_soft_delete() {
            let sql = format!(
                "UPDATE {} SET deleted_at = ?, sync_status = ?, updated_at = ?
                 WHERE id = ? AND deleted_at IS NULL",
                self.collection.table()
            );
            self.conn.execute(
                &sql,
                params![now, SyncStatus::Pending.as_str(), now, local_id],
            )?
        } else {
            let sql = format!("DELETE FROM {} WHERE id = ?", self.collection.table());
            self.conn.execute(&sql, params![local_id])?
        };

        if rows == 0 {
            return Err(Error::NotFound(format!(
                "{} record {local_id}",
                self.collection
            )));
        }

        Ok(())
    }

    fn list_pending(&self) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {}
             WHERE sync_status = 'pending'
             ORDER BY id ASC",
            self.collection.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map([], Self::parse_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn store(db: &Database) -> SqliteRecordStore<'_> {
        SqliteRecordStore::new(db.connection(), Collection::Tension)
    }

    #[test]
    fn test_create_and_get() {
        let db = setup();
        let repo = store(&db);

        let id = repo
            .create(&NewRecord::new(json!({"force": 12.5, "batch": "B-101"})))
            .unwrap();

        let record = repo.get_by_id(id).unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.payload["batch"], json!("B-101"));
        assert_eq!(record.sync_status, SyncStatus::Pending);
        assert!(record.remote_id.is_none());
        assert!(record.last_synced_at.is_none());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_create_honors_envelope_overrides() {
        let db = setup();
        let repo = store(&db);

        let id = repo
            .create(&NewRecord {
                payload: json!({"mirrored": true}),
                remote_id: Some(77),
                sync_status: Some(SyncStatus::Synced),
                last_synced_at: Some(5_000),
                created_at: Some(1_000),
                updated_at: Some(2_000),
            })
            .unwrap();

        let record = repo.get_by_id(id).unwrap().unwrap();
        assert_eq!(record.remote_id, Some(77));
        assert_eq!(record.sync_status, SyncStatus::Synced);
        assert_eq!(record.created_at, 1_000);
        assert_eq!(record.updated_at, 2_000);
        assert_eq!(record.last_synced_at, Some(5_000));
    }

    #[test]
    fn test_duplicate_remote_id_rejected() {
        let db = setup();
        let repo = store(&db);

        let mut new = NewRecord::new(json!({}));
        new.remote_id = Some(9);
        repo.create(&new).unwrap();
        assert!(repo.create(&new).is_err());
    }

    #[test]
    fn test_update_merges_only_provided_fields() {
        let db = setup();
        let repo = store(&db);

        let id = repo.create(&NewRecord::new(json!({"force": 1.0}))).unwrap();
        let before = repo.get_by_id(id).unwrap().unwrap();

        repo.update(
            id,
            &RecordPatch {
                sync_status: Some(SyncStatus::Synced),
                last_synced_at: Some(9_000),
                ..RecordPatch::default()
            },
        )
        .unwrap();

        let after = repo.get_by_id(id).unwrap().unwrap();
        assert_eq!(after.payload, before.payload);
        assert_eq!(after.remote_id, None);
        assert_eq!(after.sync_status, SyncStatus::Synced);
        assert_eq!(after.last_synced_at, Some(9_000));
        assert!(after.updated_at >= before.updated_at);
    }

    #[test]
    fn test_update_honors_explicit_stamp() {
        let db = setup();
        let repo = store(&db);

        let id = repo.create(&NewRecord::new(json!({}))).unwrap();
        repo.update(
            id,
            &RecordPatch {
                updated_at: Some(1_234),
                ..RecordPatch::default()
            },
        )
        .unwrap();

        let record = repo.get_by_id(id).unwrap().unwrap();
        assert_eq!(record.updated_at, 1_234);
    }

    #[test]
    fn test_update_missing_record() {
        let db = setup();
        let repo = store(&db);

        let error = repo.update(404, &RecordPatch::default()).unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[test]
    fn test_soft_delete_hides_row_but_keeps_it_pending() {
        let db = setup();
        let repo = store(&db);

        let id = repo
            .create(&NewRecord {
                payload: json!({}),
                remote_id: Some(42),
                sync_status: Some(SyncStatus::Synced),
                ..NewRecord::default()
            })
            .unwrap();

        repo.delete(id).unwrap();

        assert!(repo.get_by_id(id).unwrap().is_none());
        assert!(repo.get_by_remote_id(42).unwrap().is_none());

        let tombstone = repo.get_by_remote_id_any(42).unwrap().unwrap();
        assert!(tombstone.is_deleted());
        assert_eq!(tombstone.sync_status, SyncStatus::Pending);

        let pending = repo.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);

        // Deleting again is a no-op failure
        assert!(matches!(repo.delete(id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_hard_delete_for_finish_earlier() {
        let db = setup();
        let repo = SqliteRecordStore::new(db.connection(), Collection::FinishEarlier);

        let id = repo.create(&NewRecord::new(json!({"entries": []}))).unwrap();
        repo.delete(id).unwrap();

        assert!(repo.get_by_id(id).unwrap().is_none());
        assert!(repo.list_pending().unwrap().is_empty());
    }

    #[test]
    fn test_list_pagination() {
        let db = setup();
        let repo = store(&db);

        for index in 0..25 {
            repo.create(&NewRecord {
                payload: json!({"index": index}),
                created_at: Some(1_000 + index),
                updated_at: Some(1_000 + index),
                ..NewRecord::default()
            })
            .unwrap();
        }

        let mut seen = Vec::new();
        for page in 1..=3 {
            let listing = repo.list(&ListFilter::default(), page, 10).unwrap();
            assert_eq!(listing.total, 25);
            assert_eq!(listing.last_page, 3);
            assert_eq!(listing.current_page, page);
            seen.extend(listing.data.iter().map(|record| record.id));

            // Newest first within every page
            for pair in listing.data.windows(2) {
                assert!(pair[0].created_at >= pair[1].created_at);
            }
        }

        // Pages are disjoint and cover everything
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 25);
    }

    #[test]
    fn test_list_rejects_invalid_paging() {
        let db = setup();
        let repo = store(&db);

        assert!(matches!(
            repo.list(&ListFilter::default(), 0, 10),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            repo.list(&ListFilter::default(), 1, 0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_list_excludes_soft_deleted() {
        let db = setup();
        let repo = store(&db);

        let keep = repo.create(&NewRecord::new(json!({"keep": true}))).unwrap();
        let gone = repo.create(&NewRecord::new(json!({"keep": false}))).unwrap();
        repo.delete(gone).unwrap();

        let listing = repo.list(&ListFilter::default(), 1, 10).unwrap();
        assert_eq!(listing.total, 1);
        assert_eq!(listing.data[0].id, keep);
    }

    #[test]
    fn test_list_filter_search_and_range() {
        let db = setup();
        let repo = store(&db);

        repo.create(&NewRecord {
            payload: json!({"batch": "B-101"}),
            created_at: Some(1_000),
            ..NewRecord::default()
        })
        .unwrap();
        repo.create(&NewRecord {
            payload: json!({"batch": "B-202"}),
            created_at: Some(2_000),
            ..NewRecord::default()
        })
        .unwrap();

        let by_text = repo
            .list(
                &ListFilter {
                    search: Some("B-101".to_string()),
                    ..ListFilter::default()
                },
                1,
                10,
            )
            .unwrap();
        assert_eq!(by_text.total, 1);
        assert_eq!(by_text.data[0].payload["batch"], json!("B-101"));

        let by_range = repo
            .list(
                &ListFilter {
                    created_from: Some(1_500),
                    ..ListFilter::default()
                },
                1,
                10,
            )
            .unwrap();
        assert_eq!(by_range.total, 1);
        assert_eq!(by_range.data[0].payload["batch"], json!("B-202"));
    }

    #[test]
    fn test_collections_are_independent() {
        let db = setup();
        let tension = SqliteRecordStore::new(db.connection(), Collection::Tension);
        let stock = SqliteRecordStore::new(db.connection(), Collection::StockTake);

        tension.create(&NewRecord::new(json!({"kind": "tension"}))).unwrap();

        assert_eq!(tension.list(&ListFilter::default(), 1, 10).unwrap().total, 1);
        assert_eq!(stock.list(&ListFilter::default(), 1, 10).unwrap().total, 0);
    }
}
