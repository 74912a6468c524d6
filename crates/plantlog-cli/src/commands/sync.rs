use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use plantlog_core::db::{
    ConflictStore, Database, HistoryStore, SqliteConflictStore, SqliteHistoryStore,
};
use plantlog_core::remote::HttpRemoteClient;
use plantlog_core::sync::{load_settings, SyncEngine, SyncPhase, SyncReport};

use crate::cli::SyncCommands;
use crate::commands::common::{format_timestamp, open_database};
use crate::error::CliError;

pub async fn run(command: Option<SyncCommands>, db_path: &Path) -> Result<(), CliError> {
    match command {
        None => run_full(db_path).await,
        Some(SyncCommands::Push) => run_push(db_path).await,
        Some(SyncCommands::Pull) => run_pull(db_path).await,
        Some(SyncCommands::Check) => run_check(db_path).await,
        Some(SyncCommands::Status { json }) => run_status(json, db_path),
        Some(SyncCommands::History { limit, json }) => run_history(limit, json, db_path),
        Some(SyncCommands::Conflicts { json }) => run_conflicts(json, db_path),
        Some(SyncCommands::Resolve { id, keep }) => run_resolve(&id, keep, db_path),
        Some(SyncCommands::Watch) => run_watch(db_path).await,
    }
}

fn build_engine(db: &Arc<Mutex<Database>>) -> Result<SyncEngine<HttpRemoteClient>, CliError> {
    Ok(SyncEngine::from_settings(Arc::clone(db))?)
}

fn print_progress(engine: &SyncEngine<HttpRemoteClient>) -> plantlog_core::sync::SubscriptionId {
    engine.subscribe(|event| {
        if event.phase != SyncPhase::Complete {
            println!("  [{}/{}] {}", event.current, event.total, event.message);
        }
    })
}

fn print_report(report: &SyncReport) {
    println!(
        "{}: {} uploaded, {} downloaded, {} conflicts",
        if report.success { "Sync completed" } else { "Sync finished with errors" },
        report.uploaded,
        report.downloaded,
        report.conflicts
    );
    for error in &report.errors {
        eprintln!("  error: {error}");
    }
}

async fn run_full(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let engine = build_engine(&db)?;
    let subscription = print_progress(&engine);

    let report = engine.sync_all().await;
    engine.unsubscribe(subscription);
    print_report(&report);
    Ok(())
}

async fn run_push(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let engine = build_engine(&db)?;
    let report = engine.push_to_remote().await;
    print_report(&report);
    Ok(())
}

async fn run_pull(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let engine = build_engine(&db)?;
    let report = engine.pull_from_remote().await;
    print_report(&report);
    Ok(())
}

async fn run_check(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let engine = build_engine(&db)?;

    if engine.check_connection().await {
        println!("Connected");
    } else {
        println!("Not connected");
    }
    Ok(())
}

fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let engine = build_engine(&db)?;
    let status = engine.status()?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("pending:    {}", status.pending);
    println!("conflicts:  {}", status.conflicts);
    match status.last_synced_at {
        Some(stamp) => println!("last sync:  {}", format_timestamp(stamp)),
        None => println!("last sync:  never"),
    }
    Ok(())
}

fn run_history(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let guard = db.lock().unwrap();
    let entries = SqliteHistoryStore::new(guard.connection()).list_recent(limit)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No sync runs recorded.");
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{}  {:<4}  {:<7}  up {:>3}  down {:>3}  conflicts {:>2}  errors {:>2}",
            format_timestamp(entry.started_at),
            entry.sync_type.as_str(),
            entry.outcome.as_str(),
            entry.uploaded,
            entry.downloaded,
            entry.conflicts,
            entry.errors.len()
        );
    }
    Ok(())
}

fn run_conflicts(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let guard = db.lock().unwrap();
    let conflicts = SqliteConflictStore::new(guard.connection()).list()?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&conflicts)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No open conflicts.");
        return Ok(());
    }

    for conflict in &conflicts {
        println!(
            "{:<24}  local {}  remote {}  detected {}",
            conflict.id,
            format_timestamp(conflict.local.updated_at),
            format_timestamp(conflict.remote.updated_at),
            format_timestamp(conflict.detected_at)
        );
    }
    println!("Resolve with `plantlog sync resolve <id> --keep local|remote`.");
    Ok(())
}

fn run_resolve(
    conflict_id: &str,
    keep: crate::cli::ResolutionArg,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let engine = build_engine(&db)?;
    engine.resolve_conflict(conflict_id, keep.into())?;
    println!("{conflict_id}");
    Ok(())
}

/// Timed full-sync loop driven by the persisted settings.
///
/// Settings are re-read every tick so interval or enablement changes take
/// effect without restarting the watcher. Overlapping ticks are absorbed by
/// the engine's in-progress guard.
async fn run_watch(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let settings = load_settings(&db)?;

    if settings.sync_on_startup {
        let engine = build_engine(&db)?;
        let report = engine.sync_all().await;
        print_report(&report);
    }

    if !settings.auto_sync {
        return Err(CliError::AutoSyncDisabled);
    }

    loop {
        let settings = load_settings(&db)?;
        if !settings.auto_sync {
            println!("Auto-sync disabled; stopping watch.");
            return Ok(());
        }

        let minutes = settings.sync_interval_minutes.max(1);
        tracing::debug!("next sync in {minutes} minutes");
        tokio::time::sleep(Duration::from_secs(u64::from(minutes) * 60)).await;

        let engine = build_engine(&db)?;
        let report = engine.sync_all().await;
        print_report(&report);
    }
}
