//! Database migrations

use rusqlite::Connection;

use crate::error::Result;
use crate::models::Collection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get::<_, i32>(0).map(|flag| flag != 0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Migration to version 1: record collections and sync settings
fn migrate_v1(conn: &Connection) -> Result<()> {
    let mut batch = String::from(
        "BEGIN;
         CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY
         );",
    );

    // The three collections share the same envelope schema
    for collection in Collection::ALL {
        let table = collection.table();
        batch.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 remote_id INTEGER,
                 payload TEXT NOT NULL,
                 sync_status TEXT NOT NULL DEFAULT 'pending',
                 last_synced_at INTEGER,
                 created_at INTEGER NOT NULL,
                 updated_at INTEGER NOT NULL,
                 deleted_at INTEGER
             );
             CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_remote
                 ON {table}(remote_id) WHERE remote_id IS NOT NULL;
             CREATE INDEX IF NOT EXISTS idx_{table}_status ON {table}(sync_status);
             CREATE INDEX IF NOT EXISTS idx_{table}_created ON {table}(created_at DESC);"
        ));
    }

    batch.push_str(
        "CREATE TABLE IF NOT EXISTS sync_settings (
             id INTEGER PRIMARY KEY CHECK (id = 1),
             server_url TEXT,
             auth_token TEXT,
             auto_sync INTEGER NOT NULL DEFAULT 0,
             sync_interval_minutes INTEGER NOT NULL DEFAULT 15,
             sync_on_startup INTEGER NOT NULL DEFAULT 0,
             tension_enabled INTEGER NOT NULL DEFAULT 1,
             stock_take_enabled INTEGER NOT NULL DEFAULT 1,
             finish_earlier_enabled INTEGER NOT NULL DEFAULT 1
         );
         INSERT OR IGNORE INTO sync_settings (id) VALUES (1);
         INSERT INTO schema_version (version) VALUES (1);
         COMMIT;",
    );

    conn.execute_batch(&batch)?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: sync history and conflict queue
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
         CREATE TABLE IF NOT EXISTS sync_history (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             sync_type TEXT NOT NULL,
             outcome TEXT NOT NULL,
             uploaded INTEGER NOT NULL DEFAULT 0,
             downloaded INTEGER NOT NULL DEFAULT 0,
             conflicts INTEGER NOT NULL DEFAULT 0,
             errors TEXT NOT NULL DEFAULT '[]',
             started_at INTEGER NOT NULL,
             completed_at INTEGER NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_sync_history_started
             ON sync_history(started_at DESC);
         CREATE TABLE IF NOT EXISTS sync_conflicts (
             id TEXT PRIMARY KEY,
             collection TEXT NOT NULL,
             local_id INTEGER NOT NULL,
             local_snapshot TEXT NOT NULL,
             remote_snapshot TEXT NOT NULL,
             local_updated_at INTEGER NOT NULL,
             remote_updated_at INTEGER NOT NULL,
             detected_at INTEGER NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_sync_conflicts_detected
             ON sync_conflicts(detected_at DESC);
         INSERT INTO schema_version (version) VALUES (2);
         COMMIT;",
    )?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
