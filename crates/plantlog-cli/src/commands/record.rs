use std::path::Path;

use plantlog_core::db::{RecordStore, SqliteRecordStore};
use plantlog_core::models::{Collection, ListFilter, NewRecord, RecordPatch, SyncStatus};

use crate::cli::RecordCommands;
use crate::commands::common::{
    format_timestamp, open_database, payload_preview, record_to_list_item, resolve_payload,
    RecordListItem,
};
use crate::error::CliError;

pub fn run(command: RecordCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        RecordCommands::Add {
            collection,
            payload,
        } => run_add(collection.into(), payload.as_deref(), db_path),
        RecordCommands::List {
            collection,
            page,
            per_page,
            search,
            json,
        } => run_list(collection.into(), page, per_page, search, json, db_path),
        RecordCommands::Show { collection, id } => run_show(collection.into(), id, db_path),
        RecordCommands::Edit {
            collection,
            id,
            payload,
        } => run_edit(collection.into(), id, payload.as_deref(), db_path),
        RecordCommands::Delete { collection, id } => run_delete(collection.into(), id, db_path),
    }
}

fn run_add(collection: Collection, payload: Option<&str>, db_path: &Path) -> Result<(), CliError> {
    let payload = resolve_payload(payload)?;

    let db = open_database(db_path)?;
    let guard = db.lock().unwrap();
    let store = SqliteRecordStore::new(guard.connection(), collection);
    let id = store.create(&NewRecord::new(payload))?;

    println!("{id}");
    Ok(())
}

fn run_list(
    collection: Collection,
    page: u32,
    per_page: u32,
    search: Option<String>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let guard = db.lock().unwrap();
    let store = SqliteRecordStore::new(guard.connection(), collection);

    let filter = ListFilter {
        search,
        ..ListFilter::default()
    };
    let listing = store.list(&filter, page, per_page)?;

    if as_json {
        let items = listing
            .data
            .iter()
            .map(record_to_list_item)
            .collect::<Vec<RecordListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    for record in &listing.data {
        let remote = record
            .remote_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        println!(
            "{:>5}  {:<8}  {:>6}  {}  {}",
            record.id,
            record.sync_status.as_str(),
            remote,
            format_timestamp(record.updated_at),
            payload_preview(record, 48)
        );
    }
    println!(
        "page {} of {} ({} records)",
        listing.current_page, listing.last_page, listing.total
    );

    Ok(())
}

fn run_show(collection: Collection, id: i64, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let guard = db.lock().unwrap();
    let store = SqliteRecordStore::new(guard.connection(), collection);

    let record = store
        .get_by_id(id)?
        .ok_or(CliError::RecordNotFound(id))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn run_edit(
    collection: Collection,
    id: i64,
    payload: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let payload = resolve_payload(payload)?;

    let db = open_database(db_path)?;
    let guard = db.lock().unwrap();
    let store = SqliteRecordStore::new(guard.connection(), collection);

    store.get_by_id(id)?.ok_or(CliError::RecordNotFound(id))?;

    // An edit makes the row pending again so the change propagates
    store.update(
        id,
        &RecordPatch {
            payload: Some(payload),
            sync_status: Some(SyncStatus::Pending),
            ..RecordPatch::default()
        },
    )?;

    println!("{id}");
    Ok(())
}

fn run_delete(collection: Collection, id: i64, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let guard = db.lock().unwrap();
    let store = SqliteRecordStore::new(guard.connection(), collection);

    store.get_by_id(id)?.ok_or(CliError::RecordNotFound(id))?;
    store.delete(id)?;

    println!("{id}");
    Ok(())
}
