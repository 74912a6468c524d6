//! Sync engine
//!
//! Drives the synchronization protocol: push pending local changes, pull
//! remote changes, detect conflicts, update local sync state, and emit
//! progress events. Network calls are the only suspension points; the store
//! mutex is never held across an await.

mod progress;

pub use progress::{ProgressEvent, ProgressNotifier, SubscriptionId, SyncPhase};

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::db::{
    ConflictStore, Database, HistoryStore, RecordStore, SettingsStore, SqliteConflictStore,
    SqliteHistoryStore, SqliteRecordStore, SqliteSettingsStore,
};
use crate::error::{Error, Result};
use crate::models::{
    Collection, NewRecord, Record, RecordPatch, SyncConflict, SyncSettings, SyncStatus, SyncType,
};
use crate::remote::{HttpRemoteClient, RemoteApi, RemoteError, RemoteRecord};

/// Page size used when paging through remote listings
const PULL_PAGE_SIZE: u32 = 50;

/// Accumulated result of a sync run.
///
/// Never an `Err`: per-record failures land in `errors` and the run carries
/// on with the next record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub success: bool,
    pub uploaded: u32,
    pub downloaded: u32,
    pub conflicts: u32,
    pub errors: Vec<String>,
}

impl SyncReport {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![error.into()],
            ..Self::default()
        }
    }
}

/// Which side wins when resolving a recorded conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Keep the local content and push it on the next run
    Local,
    /// Overwrite local content with the stored remote snapshot
    Remote,
}

impl FromStr for ConflictResolution {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(format!("unknown resolution: {other} (expected local or remote)")),
        }
    }
}

/// User-facing sync state summary.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatusSummary {
    /// Rows awaiting push across all collections
    pub pending: u64,
    /// Open conflicts awaiting manual resolution
    pub conflicts: u64,
    /// Completion stamp of the last fully successful run (Unix ms)
    pub last_synced_at: Option<i64>,
    /// Whether a full sync is currently in flight
    pub syncing: bool,
}

/// Outcome of pushing a single record
enum PushOutcome {
    Uploaded,
    Conflict,
    Skipped,
}

/// Outcome of applying a single remote record locally
enum PullOutcome {
    Downloaded,
    Conflict,
    Unchanged,
}

/// Per-record step failure; recorded as a string, never fatal to the run
#[derive(Debug, Error)]
enum StepError {
    #[error(transparent)]
    Store(#[from] Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// The sync orchestrator.
///
/// Generic over the remote API so tests run against an in-memory fake.
/// `remote` is `None` when the stored settings lack a server URL or token;
/// every sync entry point then short-circuits with a configuration error
/// and no network attempt.
pub struct SyncEngine<R> {
    db: Arc<Mutex<Database>>,
    remote: Option<R>,
    syncing: AtomicBool,
    progress: ProgressNotifier,
}

impl SyncEngine<HttpRemoteClient> {
    /// Build an engine from the persisted sync settings.
    pub fn from_settings(db: Arc<Mutex<Database>>) -> Result<Self> {
        let settings = {
            let guard = db.lock().unwrap_or_else(PoisonError::into_inner);
            SqliteSettingsStore::new(guard.connection()).load()?
        };

        let remote = if settings.is_configured() {
            let url = settings.server_url.unwrap_or_default();
            let token = settings.auth_token.unwrap_or_default();
            let client = HttpRemoteClient::new(url, token)
                .map_err(|error| Error::InvalidInput(error.to_string()))?;
            Some(client)
        } else {
            None
        };

        Ok(Self::new(db, remote))
    }
}

impl<R: RemoteApi> SyncEngine<R> {
    pub fn new(db: Arc<Mutex<Database>>, remote: Option<R>) -> Self {
        Self {
            db,
            remote,
            syncing: AtomicBool::new(false),
            progress: ProgressNotifier::default(),
        }
    }

    /// Register a progress listener.
    pub fn subscribe(
        &self,
        listener: impl Fn(&ProgressEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.progress.subscribe(listener)
    }

    /// Remove a progress listener.
    pub fn unsubscribe(&self, subscription: SubscriptionId) {
        self.progress.unsubscribe(subscription)
    }

    /// Whether a full sync run is currently in flight.
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    /// Push then pull every enabled collection in the fixed order.
    ///
    /// A request made while a full run is in flight returns an immediate
    /// failure rather than queuing. The guard does not serialize a manual
    /// push/pull against a scheduled run.
    pub async fn sync_all(&self) -> SyncReport {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return SyncReport::failure("a full sync is already in progress");
        }

        let report = self.run(SyncType::All).await;
        self.syncing.store(false, Ordering::SeqCst);
        report
    }

    /// Run only the push phases.
    pub async fn push_to_remote(&self) -> SyncReport {
        self.run(SyncType::Push).await
    }

    /// Run only the pull phases.
    pub async fn pull_from_remote(&self) -> SyncReport {
        self.run(SyncType::Pull).await
    }

    /// Probe the remote endpoint with a page-size-1 listing call.
    ///
    /// Missing configuration short-circuits to `false` without a network
    /// attempt.
    pub async fn check_connection(&self) -> bool {
        let Some(remote) = &self.remote else {
            return false;
        };

        match remote.list(Collection::Tension, 1, 1).await {
            Ok(_) => true,
            Err(error) => {
                tracing::debug!("connectivity probe failed: {error}");
                false
            }
        }
    }

    /// Apply a manual resolution to a recorded conflict.
    pub fn resolve_conflict(&self, conflict_id: &str, resolution: ConflictResolution) -> Result<()> {
        let db = self.lock_db();
        let conn = db.connection();
        let conflicts = SqliteConflictStore::new(conn);

        let conflict = conflicts
            .get(conflict_id)?
            .ok_or_else(|| Error::NotFound(format!("conflict {conflict_id}")))?;
        let records = SqliteRecordStore::new(conn, conflict.collection);

        match resolution {
            // Re-stamping updated_at makes the local copy the newest writer,
            // so the next push overwrites the remote side.
            ConflictResolution::Local => {
                records.update(
                    conflict.local_id,
                    &RecordPatch {
                        sync_status: Some(SyncStatus::Pending),
                        ..RecordPatch::default()
                    },
                )?;
            }
            ConflictResolution::Remote => {
                records.update(
                    conflict.local_id,
                    &RecordPatch {
                        payload: Some(conflict.remote.payload()),
                        sync_status: Some(SyncStatus::Synced),
                        last_synced_at: Some(Utc::now().timestamp_millis()),
                        updated_at: Some(conflict.remote.updated_at),
                        ..RecordPatch::default()
                    },
                )?;
            }
        }

        conflicts.remove(conflict_id)?;
        tracing::info!("resolved conflict {conflict_id} keeping {resolution:?} side");
        Ok(())
    }

    /// Pending/conflict counts and the last successful sync stamp.
    pub fn status(&self) -> Result<SyncStatusSummary> {
        let db = self.lock_db();
        let info = db.info()?;
        let conn = db.connection();

        Ok(SyncStatusSummary {
            pending: info.collections.iter().map(|c| c.pending).sum(),
            conflicts: SqliteConflictStore::new(conn).count()?,
            last_synced_at: SqliteHistoryStore::new(conn).last_successful_at()?,
            syncing: self.is_syncing(),
        })
    }

    fn lock_db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(&self, sync_type: SyncType) -> SyncReport {
        let started_at = Utc::now().timestamp_millis();
        let mut report = SyncReport::default();

        let settings = {
            let db = self.lock_db();
            SqliteSettingsStore::new(db.connection()).load()
        };
        let settings = match settings {
            Ok(settings) => settings,
            Err(error) => {
                report.errors.push(format!("loading sync settings failed: {error}"));
                return self.finish(sync_type, report, started_at);
            }
        };

        if let Some(remote) = &self.remote {
            for collection in Collection::ALL {
                if !settings.collection_enabled(collection) {
                    tracing::debug!("skipping disabled collection {collection}");
                    continue;
                }
                if matches!(sync_type, SyncType::All | SyncType::Push) {
                    self.push_collection(remote, collection, &mut report).await;
                }
                if matches!(sync_type, SyncType::All | SyncType::Pull) {
                    self.pull_collection(remote, collection, &mut report).await;
                }
            }
        } else {
            report
                .errors
                .push("sync is not configured: server URL and auth token are required".to_string());
        }

        self.finish(sync_type, report, started_at)
    }

    fn finish(&self, sync_type: SyncType, mut report: SyncReport, started_at: i64) -> SyncReport {
        report.success = report.errors.is_empty();
        let completed_at = Utc::now().timestamp_millis();

        let appended = {
            let db = self.lock_db();
            SqliteHistoryStore::new(db.connection()).append(
                sync_type,
                report.uploaded,
                report.downloaded,
                report.conflicts,
                &report.errors,
                started_at,
                completed_at,
            )
        };
        if let Err(error) = appended {
            tracing::error!("failed to record sync history: {error}");
            report.errors.push(format!("recording sync history failed: {error}"));
            report.success = false;
        }

        let transferred = (report.uploaded + report.downloaded) as usize;
        self.progress.emit(&ProgressEvent {
            phase: SyncPhase::Complete,
            collection: None,
            current: transferred,
            total: transferred,
            message: format!(
                "Sync finished: {} uploaded, {} downloaded, {} conflicts, {} errors",
                report.uploaded,
                report.downloaded,
                report.conflicts,
                report.errors.len()
            ),
        });

        report
    }

    async fn push_collection(&self, remote: &R, collection: Collection, report: &mut SyncReport) {
        let pending = {
            let db = self.lock_db();
            SqliteRecordStore::new(db.connection(), collection).list_pending()
        };
        let pending = match pending {
            Ok(rows) => rows,
            Err(error) => {
                report
                    .errors
                    .push(format!("{collection}: listing pending records failed: {error}"));
                return;
            }
        };

        let total = pending.len();
        for (index, record) in pending.into_iter().enumerate() {
            self.progress.emit(&ProgressEvent {
                phase: SyncPhase::Upload,
                collection: Some(collection),
                current: index + 1,
                total,
                message: format!("Uploading {collection} record {}", record.id),
            });

            match self.push_record(remote, collection, &record).await {
                Ok(PushOutcome::Uploaded) => report.uploaded += 1,
                Ok(PushOutcome::Conflict) => report.conflicts += 1,
                Ok(PushOutcome::Skipped) => {}
                Err(error) => {
                    tracing::warn!("push of {collection} record {} failed: {error}", record.id);
                    report
                        .errors
                        .push(format!("{collection} record {}: {error}", record.id));
                }
            }
        }
    }

    async fn push_record(
        &self,
        remote: &R,
        collection: Collection,
        record: &Record,
    ) -> std::result::Result<PushOutcome, StepError> {
        let now = Utc::now().timestamp_millis();

        if record.is_deleted() {
            let Some(remote_id) = record.remote_id else {
                // Deleted before it was ever pushed; nothing to propagate
                self.patch_record(collection, record, SyncStatus::Synced, now)?;
                return Ok(PushOutcome::Skipped);
            };

            remote.delete(collection, remote_id).await?;
            self.patch_record(collection, record, SyncStatus::Synced, now)?;
            return Ok(PushOutcome::Uploaded);
        }

        if let Some(remote_id) = record.remote_id {
            let remote_copy = remote.get(collection, remote_id).await?;
            if remote_copy.updated_at > record.updated_at {
                let db = self.lock_db();
                record_conflict(db.connection(), collection, record, remote_copy, now)?;
                return Ok(PushOutcome::Conflict);
            }

            remote.update(collection, remote_id, &record.payload).await?;
            self.patch_record(collection, record, SyncStatus::Synced, now)?;
            return Ok(PushOutcome::Uploaded);
        }

        let new_remote_id = remote.create(collection, &record.payload).await?;
        let db = self.lock_db();
        SqliteRecordStore::new(db.connection(), collection).update(
            record.id,
            &RecordPatch {
                remote_id: Some(new_remote_id),
                sync_status: Some(SyncStatus::Synced),
                last_synced_at: Some(now),
                updated_at: Some(record.updated_at),
                ..RecordPatch::default()
            },
        )?;
        Ok(PushOutcome::Uploaded)
    }

    /// Status-only bookkeeping; preserves the record's own update stamp so
    /// last-write-wins ordering is undisturbed.
    fn patch_record(
        &self,
        collection: Collection,
        record: &Record,
        sync_status: SyncStatus,
        now: i64,
    ) -> Result<()> {
        let db = self.lock_db();
        SqliteRecordStore::new(db.connection(), collection).update(
            record.id,
            &RecordPatch {
                sync_status: Some(sync_status),
                last_synced_at: Some(now),
                updated_at: Some(record.updated_at),
                ..RecordPatch::default()
            },
        )
    }

    async fn pull_collection(&self, remote: &R, collection: Collection, report: &mut SyncReport) {
        let mut page = 1u32;
        loop {
            let listing = match remote.list(collection, page, PULL_PAGE_SIZE).await {
                Ok(listing) => listing,
                Err(error) => {
                    // A failed listing aborts this phase's remaining pages
                    report
                        .errors
                        .push(format!("{collection}: listing page {page} failed: {error}"));
                    return;
                }
            };

            self.progress.emit(&ProgressEvent {
                phase: SyncPhase::Download,
                collection: Some(collection),
                current: listing.current_page as usize,
                total: listing.last_page as usize,
                message: format!(
                    "Downloading {collection} page {} of {}",
                    listing.current_page, listing.last_page
                ),
            });

            for remote_record in &listing.data {
                match self.apply_remote_record(collection, remote_record) {
                    Ok(PullOutcome::Downloaded) => report.downloaded += 1,
                    Ok(PullOutcome::Conflict) => report.conflicts += 1,
                    Ok(PullOutcome::Unchanged) => {}
                    Err(error) => {
                        tracing::warn!(
                            "applying {collection} remote record {} failed: {error}",
                            remote_record.id
                        );
                        report.errors.push(format!(
                            "{collection} remote record {}: {error}",
                            remote_record.id
                        ));
                    }
                }
            }

            if listing.current_page >= listing.last_page {
                break;
            }
            page = listing.current_page + 1;
        }
    }

    fn apply_remote_record(
        &self,
        collection: Collection,
        remote_record: &RemoteRecord,
    ) -> Result<PullOutcome> {
        let now = Utc::now().timestamp_millis();
        let db = self.lock_db();
        let conn = db.connection();
        let records = SqliteRecordStore::new(conn, collection);

        // Dedup against every local row, tombstones included
        let Some(local) = records.get_by_remote_id_any(remote_record.id)? else {
            records.create(&NewRecord {
                payload: remote_record.payload(),
                remote_id: Some(remote_record.id),
                sync_status: Some(SyncStatus::Synced),
                last_synced_at: Some(now),
                created_at: Some(
                    remote_record
                        .created_at_hint()
                        .unwrap_or(remote_record.updated_at),
                ),
                updated_at: Some(remote_record.updated_at),
            })?;
            return Ok(PullOutcome::Downloaded);
        };

        if remote_record.updated_at > local.updated_at {
            if local.sync_status == SyncStatus::Pending {
                record_conflict(conn, collection, &local, remote_record.clone(), now)?;
                return Ok(PullOutcome::Conflict);
            }
            if local.sync_status == SyncStatus::Conflict {
                // Already queued for manual resolution; overwriting here
                // would resolve it behind the operator's back
                return Ok(PullOutcome::Unchanged);
            }

            records.update(
                local.id,
                &RecordPatch {
                    payload: Some(remote_record.payload()),
                    sync_status: Some(SyncStatus::Synced),
                    last_synced_at: Some(now),
                    updated_at: Some(remote_record.updated_at),
                    ..RecordPatch::default()
                },
            )?;
            return Ok(PullOutcome::Downloaded);
        }

        // Local is at least as current
        Ok(PullOutcome::Unchanged)
    }
}

/// Record a divergence: upsert the snapshot pair and flag the local row.
///
/// The local row's content and update stamp are untouched.
fn record_conflict(
    conn: &Connection,
    collection: Collection,
    record: &Record,
    remote_copy: RemoteRecord,
    now: i64,
) -> Result<()> {
    let conflict = SyncConflict::new(collection, record.clone(), remote_copy, now);
    SqliteConflictStore::new(conn).upsert(&conflict)?;
    SqliteRecordStore::new(conn, collection).update(
        record.id,
        &RecordPatch {
            sync_status: Some(SyncStatus::Conflict),
            updated_at: Some(record.updated_at),
            ..RecordPatch::default()
        },
    )?;
    tracing::info!("recorded conflict {}", conflict.id);
    Ok(())
}

/// Load the persisted settings; convenience for interface crates.
pub fn load_settings(db: &Arc<Mutex<Database>>) -> Result<SyncSettings> {
    let guard = db.lock().unwrap_or_else(PoisonError::into_inner);
    SqliteSettingsStore::new(guard.connection()).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{conflict_id, ListFilter};
    use crate::remote::{RemotePage, RemoteResult};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;

    /// In-memory stand-in for the remote API.
    #[derive(Clone, Default)]
    struct FakeRemote {
        state: Arc<Mutex<FakeState>>,
    }

    #[derive(Default)]
    struct FakeState {
        records: HashMap<(Collection, i64), RemoteRecord>,
        next_id: i64,
        fail_creates: bool,
        fail_listing: bool,
        page_size_cap: Option<u32>,
        deletes: Vec<(Collection, i64)>,
        updates: Vec<(Collection, i64)>,
    }

    impl FakeRemote {
        fn with_next_id(next_id: i64) -> Self {
            let fake = Self::default();
            fake.state.lock().unwrap().next_id = next_id;
            fake
        }

        fn insert(&self, collection: Collection, id: i64, updated_at: i64, payload: serde_json::Value) {
            let record = RemoteRecord {
                id,
                updated_at,
                fields: payload.as_object().cloned().unwrap_or_default(),
            };
            self.state
                .lock()
                .unwrap()
                .records
                .insert((collection, id), record);
        }

        fn record(&self, collection: Collection, id: i64) -> Option<RemoteRecord> {
            self.state.lock().unwrap().records.get(&(collection, id)).cloned()
        }

        fn set_fail_creates(&self, fail: bool) {
            self.state.lock().unwrap().fail_creates = fail;
        }

        fn set_fail_listing(&self, fail: bool) {
            self.state.lock().unwrap().fail_listing = fail;
        }

        fn set_page_size_cap(&self, cap: u32) {
            self.state.lock().unwrap().page_size_cap = Some(cap);
        }

        fn deletes(&self) -> Vec<(Collection, i64)> {
            self.state.lock().unwrap().deletes.clone()
        }

        fn updates(&self) -> Vec<(Collection, i64)> {
            self.state.lock().unwrap().updates.clone()
        }
    }

    impl RemoteApi for FakeRemote {
        async fn list(
            &self,
            collection: Collection,
            page: u32,
            per_page: u32,
        ) -> RemoteResult<RemotePage> {
            let state = self.state.lock().unwrap();
            if state.fail_listing {
                return Err(RemoteError::Api("simulated listing failure".to_string()));
            }

            let per_page = state.page_size_cap.map_or(per_page, |cap| cap.min(per_page));
            let mut all: Vec<RemoteRecord> = state
                .records
                .iter()
                .filter(|((c, _), _)| *c == collection)
                .map(|(_, record)| record.clone())
                .collect();
            all.sort_by_key(|record| record.id);

            let total = all.len() as u64;
            let last_page = (total.div_ceil(u64::from(per_page)) as u32).max(1);
            let start = ((page - 1) * per_page) as usize;
            let data = all.into_iter().skip(start).take(per_page as usize).collect();

            Ok(RemotePage {
                data,
                current_page: page,
                last_page,
                per_page,
                total,
            })
        }

        async fn get(&self, collection: Collection, remote_id: i64) -> RemoteResult<RemoteRecord> {
            self.record(collection, remote_id)
                .ok_or_else(|| RemoteError::Api(format!("record {remote_id} not found (404)")))
        }

        async fn create(
            &self,
            collection: Collection,
            payload: &serde_json::Value,
        ) -> RemoteResult<i64> {
            let mut state = self.state.lock().unwrap();
            if state.fail_creates {
                return Err(RemoteError::Api("simulated network failure".to_string()));
            }

            state.next_id += 1;
            let id = state.next_id;
            let record = RemoteRecord {
                id,
                updated_at: 0,
                fields: payload.as_object().cloned().unwrap_or_default(),
            };
            state.records.insert((collection, id), record);
            Ok(id)
        }

        async fn update(
            &self,
            collection: Collection,
            remote_id: i64,
            payload: &serde_json::Value,
        ) -> RemoteResult<()> {
            let mut state = self.state.lock().unwrap();
            let Some(record) = state.records.get_mut(&(collection, remote_id)) else {
                return Err(RemoteError::Api(format!("record {remote_id} not found (404)")));
            };
            record.fields = payload.as_object().cloned().unwrap_or_default();
            state.updates.push((collection, remote_id));
            Ok(())
        }

        async fn delete(&self, collection: Collection, remote_id: i64) -> RemoteResult<()> {
            let mut state = self.state.lock().unwrap();
            state.records.remove(&(collection, remote_id));
            state.deletes.push((collection, remote_id));
            Ok(())
        }
    }

    fn setup() -> (Arc<Mutex<Database>>, FakeRemote, SyncEngine<FakeRemote>) {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let remote = FakeRemote::default();
        let engine = SyncEngine::new(Arc::clone(&db), Some(remote.clone()));
        (db, remote, engine)
    }

    fn create_local(
        db: &Arc<Mutex<Database>>,
        collection: Collection,
        new: &NewRecord,
    ) -> i64 {
        let guard = db.lock().unwrap();
        SqliteRecordStore::new(guard.connection(), collection)
            .create(new)
            .unwrap()
    }

    fn get_local(db: &Arc<Mutex<Database>>, collection: Collection, id: i64) -> Option<Record> {
        let guard = db.lock().unwrap();
        SqliteRecordStore::new(guard.connection(), collection)
            .get_by_id(id)
            .unwrap()
    }

    fn history(db: &Arc<Mutex<Database>>) -> Vec<crate::models::SyncHistoryEntry> {
        let guard = db.lock().unwrap();
        SqliteHistoryStore::new(guard.connection())
            .list_recent(10)
            .unwrap()
    }

    fn conflicts(db: &Arc<Mutex<Database>>) -> Vec<SyncConflict> {
        let guard = db.lock().unwrap();
        SqliteConflictStore::new(guard.connection()).list().unwrap()
    }

    #[tokio::test]
    async fn test_push_assigns_remote_id_and_logs_history() {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let remote = FakeRemote::with_next_id(98);
        let engine = SyncEngine::new(Arc::clone(&db), Some(remote.clone()));

        let id = create_local(
            &db,
            Collection::Tension,
            &NewRecord::new(json!({"force": 12.5})),
        );

        let report = engine.push_to_remote().await;
        assert!(report.success, "errors: {:?}", report.errors);
        assert_eq!(report.uploaded, 1);

        let record = get_local(&db, Collection::Tension, id).unwrap();
        assert_eq!(record.remote_id, Some(99));
        assert_eq!(record.sync_status, SyncStatus::Synced);
        assert!(record.last_synced_at.is_some());
        assert!(remote.record(Collection::Tension, 99).is_some());

        let entries = history(&db);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sync_type, SyncType::Push);
        assert_eq!(entries[0].uploaded, 1);
        assert_eq!(entries[0].outcome, crate::models::SyncOutcome::Success);
    }

    #[tokio::test]
    async fn test_failed_push_retries_on_next_run() {
        let (db, remote, engine) = setup();
        remote.set_fail_creates(true);

        let id = create_local(
            &db,
            Collection::Tension,
            &NewRecord::new(json!({"force": 1.0})),
        );

        let report = engine.push_to_remote().await;
        assert!(!report.success);
        assert_eq!(report.uploaded, 0);
        assert_eq!(report.errors.len(), 1);

        let record = get_local(&db, Collection::Tension, id).unwrap();
        assert_eq!(record.sync_status, SyncStatus::Pending);
        assert!(record.remote_id.is_none());

        // The record stayed pending, so the next run picks it up naturally
        remote.set_fail_creates(false);
        let report = engine.push_to_remote().await;
        assert!(report.success);
        assert_eq!(report.uploaded, 1);

        let record = get_local(&db, Collection::Tension, id).unwrap();
        assert_eq!(record.sync_status, SyncStatus::Synced);
        assert!(record.remote_id.is_some());
    }

    #[tokio::test]
    async fn test_push_detects_conflict_when_remote_is_newer() {
        let (db, remote, engine) = setup();

        let id = create_local(
            &db,
            Collection::Tension,
            &NewRecord {
                payload: json!({"force": 1.0}),
                remote_id: Some(5),
                updated_at: Some(1_000),
                ..NewRecord::default()
            },
        );
        remote.insert(Collection::Tension, 5, 2_000, json!({"force": 9.9}));

        let report = engine.push_to_remote().await;
        assert!(report.success);
        assert_eq!(report.conflicts, 1);
        assert_eq!(report.uploaded, 0);

        // Local content untouched, row flagged, exactly one conflict queued
        let record = get_local(&db, Collection::Tension, id).unwrap();
        assert_eq!(record.payload, json!({"force": 1.0}));
        assert_eq!(record.updated_at, 1_000);
        assert_eq!(record.sync_status, SyncStatus::Conflict);

        let queued = conflicts(&db);
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].id, conflict_id(Collection::Tension, id));
        assert_eq!(queued[0].remote.updated_at, 2_000);
        assert!(remote.updates().is_empty());
    }

    #[tokio::test]
    async fn test_push_overwrites_older_remote() {
        let (db, remote, engine) = setup();

        create_local(
            &db,
            Collection::Tension,
            &NewRecord {
                payload: json!({"force": 3.0}),
                remote_id: Some(5),
                updated_at: Some(2_000),
                ..NewRecord::default()
            },
        );
        remote.insert(Collection::Tension, 5, 500, json!({"force": 1.0}));

        let report = engine.push_to_remote().await;
        assert!(report.success);
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.conflicts, 0);

        let pushed = remote.record(Collection::Tension, 5).unwrap();
        assert_eq!(pushed.fields.get("force"), Some(&json!(3.0)));
        assert_eq!(remote.updates(), vec![(Collection::Tension, 5)]);
    }

    #[tokio::test]
    async fn test_soft_delete_propagates_and_row_stays_hidden() {
        let (db, remote, engine) = setup();

        let id = create_local(
            &db,
            Collection::Tension,
            &NewRecord {
                payload: json!({"force": 1.0}),
                remote_id: Some(42),
                sync_status: Some(SyncStatus::Synced),
                ..NewRecord::default()
            },
        );
        remote.insert(Collection::Tension, 42, 100, json!({"force": 1.0}));

        {
            let guard = db.lock().unwrap();
            SqliteRecordStore::new(guard.connection(), Collection::Tension)
                .delete(id)
                .unwrap();
        }

        let report = engine.push_to_remote().await;
        assert!(report.success, "errors: {:?}", report.errors);
        assert_eq!(report.uploaded, 1);
        assert_eq!(remote.deletes(), vec![(Collection::Tension, 42)]);

        // Synced again, but still a hidden tombstone
        let guard = db.lock().unwrap();
        let store = SqliteRecordStore::new(guard.connection(), Collection::Tension);
        assert!(store.get_by_id(id).unwrap().is_none());
        assert!(store.list_pending().unwrap().is_empty());
        let tombstone = store.get_by_remote_id_any(42).unwrap().unwrap();
        assert_eq!(tombstone.sync_status, SyncStatus::Synced);
        assert!(tombstone.is_deleted());
    }

    #[tokio::test]
    async fn test_delete_before_first_push_propagates_nothing() {
        let (db, remote, engine) = setup();

        let id = create_local(
            &db,
            Collection::Tension,
            &NewRecord::new(json!({"force": 1.0})),
        );
        {
            let guard = db.lock().unwrap();
            SqliteRecordStore::new(guard.connection(), Collection::Tension)
                .delete(id)
                .unwrap();
        }

        let report = engine.push_to_remote().await;
        assert!(report.success);
        assert_eq!(report.uploaded, 0);
        assert!(remote.deletes().is_empty());

        let guard = db.lock().unwrap();
        let store = SqliteRecordStore::new(guard.connection(), Collection::Tension);
        assert!(store.list_pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pull_mirrors_remote_records_idempotently() {
        let (db, remote, engine) = setup();

        remote.insert(Collection::StockTake, 1, 1_000, json!({"sku": "A"}));
        remote.insert(Collection::StockTake, 2, 1_000, json!({"sku": "B"}));
        remote.insert(Collection::StockTake, 3, 1_000, json!({"sku": "C"}));

        let report = engine.pull_from_remote().await;
        assert!(report.success);
        assert_eq!(report.downloaded, 3);

        let count = |db: &Arc<Mutex<Database>>| {
            let guard = db.lock().unwrap();
            SqliteRecordStore::new(guard.connection(), Collection::StockTake)
                .list(&ListFilter::default(), 1, 50)
                .unwrap()
                .total
        };
        assert_eq!(count(&db), 3);

        // Pulling the same unchanged page again must not duplicate rows
        let report = engine.pull_from_remote().await;
        assert!(report.success);
        assert_eq!(report.downloaded, 0);
        assert_eq!(count(&db), 3);

        let guard = db.lock().unwrap();
        let store = SqliteRecordStore::new(guard.connection(), Collection::StockTake);
        let mirrored = store.get_by_remote_id(2).unwrap().unwrap();
        assert_eq!(mirrored.sync_status, SyncStatus::Synced);
        assert_eq!(mirrored.updated_at, 1_000);
    }

    #[tokio::test]
    async fn test_pull_pages_through_the_whole_listing() {
        let (_db, remote, engine) = setup();
        remote.set_page_size_cap(2);

        for id in 1..=5 {
            remote.insert(Collection::Tension, id, 1_000, json!({"index": id}));
        }

        let report = engine.pull_from_remote().await;
        assert!(report.success);
        assert_eq!(report.downloaded, 5);
    }

    #[tokio::test]
    async fn test_pull_overwrites_stale_synced_local() {
        let (db, remote, engine) = setup();

        let id = create_local(
            &db,
            Collection::Tension,
            &NewRecord {
                payload: json!({"force": 1.0}),
                remote_id: Some(7),
                sync_status: Some(SyncStatus::Synced),
                updated_at: Some(1_000),
                ..NewRecord::default()
            },
        );
        remote.insert(Collection::Tension, 7, 2_000, json!({"force": 2.0}));

        let report = engine.pull_from_remote().await;
        assert!(report.success);
        assert_eq!(report.downloaded, 1);

        let record = get_local(&db, Collection::Tension, id).unwrap();
        assert_eq!(record.payload, json!({"force": 2.0}));
        assert_eq!(record.updated_at, 2_000);
        assert_eq!(record.sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_pull_conflicts_instead_of_overwriting_pending_local() {
        let (db, remote, engine) = setup();

        let id = create_local(
            &db,
            Collection::Tension,
            &NewRecord {
                payload: json!({"force": 1.0}),
                remote_id: Some(7),
                updated_at: Some(1_000),
                ..NewRecord::default()
            },
        );
        remote.insert(Collection::Tension, 7, 2_000, json!({"force": 2.0}));

        let report = engine.pull_from_remote().await;
        assert!(report.success);
        assert_eq!(report.conflicts, 1);
        assert_eq!(report.downloaded, 0);

        let record = get_local(&db, Collection::Tension, id).unwrap();
        assert_eq!(record.payload, json!({"force": 1.0}));
        assert_eq!(record.sync_status, SyncStatus::Conflict);
        assert_eq!(conflicts(&db).len(), 1);
    }

    #[tokio::test]
    async fn test_pull_ignores_older_remote() {
        let (db, remote, engine) = setup();

        let id = create_local(
            &db,
            Collection::Tension,
            &NewRecord {
                payload: json!({"force": 5.0}),
                remote_id: Some(7),
                sync_status: Some(SyncStatus::Synced),
                updated_at: Some(3_000),
                ..NewRecord::default()
            },
        );
        remote.insert(Collection::Tension, 7, 1_000, json!({"force": 1.0}));

        let report = engine.pull_from_remote().await;
        assert!(report.success);
        assert_eq!(report.downloaded, 0);

        let record = get_local(&db, Collection::Tension, id).unwrap();
        assert_eq!(record.payload, json!({"force": 5.0}));
    }

    #[tokio::test]
    async fn test_resolve_conflict_round_trip() {
        let (db, remote, engine) = setup();

        let id = create_local(
            &db,
            Collection::Tension,
            &NewRecord {
                payload: json!({"force": 1.0}),
                remote_id: Some(5),
                updated_at: Some(1_000),
                ..NewRecord::default()
            },
        );
        remote.insert(Collection::Tension, 5, 2_000, json!({"force": 9.9}));
        engine.push_to_remote().await;
        let key = conflict_id(Collection::Tension, id);

        // Keep remote: content becomes the stored snapshot, entry cleared
        engine
            .resolve_conflict(&key, ConflictResolution::Remote)
            .unwrap();
        let record = get_local(&db, Collection::Tension, id).unwrap();
        assert_eq!(record.payload, json!({"force": 9.9}));
        assert_eq!(record.sync_status, SyncStatus::Synced);
        assert_eq!(record.updated_at, 2_000);
        assert!(conflicts(&db).is_empty());

        // Recreate the divergence and keep local instead
        {
            let guard = db.lock().unwrap();
            SqliteRecordStore::new(guard.connection(), Collection::Tension)
                .update(
                    id,
                    &RecordPatch {
                        payload: Some(json!({"force": 1.5})),
                        sync_status: Some(SyncStatus::Pending),
                        updated_at: Some(1_500),
                        ..RecordPatch::default()
                    },
                )
                .unwrap();
        }
        remote.insert(Collection::Tension, 5, 3_000, json!({"force": 8.8}));
        engine.push_to_remote().await;
        assert_eq!(conflicts(&db).len(), 1);

        engine
            .resolve_conflict(&key, ConflictResolution::Local)
            .unwrap();
        let record = get_local(&db, Collection::Tension, id).unwrap();
        assert_eq!(record.payload, json!({"force": 1.5}));
        assert_eq!(record.sync_status, SyncStatus::Pending);
        assert!(conflicts(&db).is_empty());

        // The re-stamped local copy now wins the next push
        let report = engine.push_to_remote().await;
        assert!(report.success);
        assert_eq!(report.uploaded, 1);
        let pushed = remote.record(Collection::Tension, 5).unwrap();
        assert_eq!(pushed.fields.get("force"), Some(&json!(1.5)));
    }

    #[tokio::test]
    async fn test_resolve_unknown_conflict() {
        let (_db, _remote, engine) = setup();
        let error = engine
            .resolve_conflict("tension-404", ConflictResolution::Local)
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_sync_all_runs_push_then_pull_and_logs_once() {
        let (db, remote, engine) = setup();

        create_local(
            &db,
            Collection::Tension,
            &NewRecord::new(json!({"force": 1.0})),
        );
        remote.insert(Collection::StockTake, 11, 1_000, json!({"sku": "A"}));

        let report = engine.sync_all().await;
        assert!(report.success, "errors: {:?}", report.errors);
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.downloaded, 1);

        let entries = history(&db);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sync_type, SyncType::All);
    }

    #[tokio::test]
    async fn test_sync_all_rejects_overlapping_runs() {
        let (_db, _remote, engine) = setup();

        engine.syncing.store(true, Ordering::SeqCst);
        assert!(engine.is_syncing());

        let report = engine.sync_all().await;
        assert!(!report.success);
        assert!(report.errors[0].contains("already in progress"));

        engine.syncing.store(false, Ordering::SeqCst);
    }

    #[tokio::test]
    async fn test_unconfigured_engine_short_circuits_with_history() {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let engine: SyncEngine<FakeRemote> = SyncEngine::new(Arc::clone(&db), None);

        assert!(!engine.check_connection().await);

        let report = engine.sync_all().await;
        assert!(!report.success);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("not configured"));

        let entries = history(&db);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, crate::models::SyncOutcome::Partial);
    }

    #[tokio::test]
    async fn test_disabled_collection_is_skipped() {
        let (db, remote, engine) = setup();

        {
            let guard = db.lock().unwrap();
            let settings_store = SqliteSettingsStore::new(guard.connection());
            let mut settings = settings_store.load().unwrap();
            settings.tension_enabled = false;
            settings_store.save(&settings).unwrap();
        }

        create_local(
            &db,
            Collection::Tension,
            &NewRecord::new(json!({"force": 1.0})),
        );
        remote.insert(Collection::StockTake, 1, 1_000, json!({"sku": "A"}));

        let report = engine.sync_all().await;
        assert!(report.success);
        assert_eq!(report.uploaded, 0);
        assert_eq!(report.downloaded, 1);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_pull_phase_only() {
        let (db, remote, engine) = setup();
        remote.set_fail_listing(true);

        create_local(
            &db,
            Collection::Tension,
            &NewRecord::new(json!({"force": 1.0})),
        );

        let report = engine.sync_all().await;
        assert!(!report.success);
        // Push still went through; each collection's pull recorded one error
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.errors.len(), 3);

        let entries = history(&db);
        assert_eq!(entries[0].outcome, crate::models::SyncOutcome::Failed);
    }

    #[tokio::test]
    async fn test_progress_events_cover_phases_and_complete() {
        let (db, remote, engine) = setup();

        create_local(
            &db,
            Collection::Tension,
            &NewRecord::new(json!({"force": 1.0})),
        );
        remote.insert(Collection::StockTake, 1, 1_000, json!({"sku": "A"}));

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let subscription = engine.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        engine.sync_all().await;
        engine.unsubscribe(subscription);

        let seen = events.lock().unwrap();
        assert!(seen.iter().any(|e| e.phase == SyncPhase::Upload));
        assert!(seen.iter().any(|e| e.phase == SyncPhase::Download));
        assert_eq!(seen.last().unwrap().phase, SyncPhase::Complete);
    }

    #[tokio::test]
    async fn test_check_connection_probes_remote() {
        let (_db, remote, engine) = setup();
        assert!(engine.check_connection().await);

        remote.set_fail_listing(true);
        assert!(!engine.check_connection().await);
    }

    #[tokio::test]
    async fn test_status_summarizes_store_state() {
        let (db, remote, engine) = setup();

        create_local(
            &db,
            Collection::Tension,
            &NewRecord::new(json!({"force": 1.0})),
        );
        create_local(
            &db,
            Collection::StockTake,
            &NewRecord {
                payload: json!({"sku": "A"}),
                remote_id: Some(9),
                updated_at: Some(1_000),
                ..NewRecord::default()
            },
        );
        remote.insert(Collection::StockTake, 9, 2_000, json!({"sku": "B"}));

        let report = engine.sync_all().await;
        assert!(report.success);
        assert_eq!(report.conflicts, 1);

        let status = engine.status().unwrap();
        assert_eq!(status.pending, 0);
        assert_eq!(status.conflicts, 1);
        assert!(status.last_synced_at.is_some());
        assert!(!status.syncing);
    }
}
