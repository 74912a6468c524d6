use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use plantlog_core::db::Database;
use plantlog_core::models::Record;
use serde::Serialize;

use crate::error::CliError;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("PLANTLOG_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("plantlog")
        .join("plantlog.db")
}

pub fn open_database(path: &Path) -> Result<Arc<Mutex<Database>>, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    Ok(Arc::new(Mutex::new(Database::open(path)?)))
}

/// Resolve a record payload from the `--payload` flag or piped stdin.
pub fn resolve_payload(inline: Option<&str>) -> Result<serde_json::Value, CliError> {
    let raw = match inline {
        Some(text) => text.to_string(),
        None => read_piped_stdin()?.ok_or(CliError::EmptyPayload)?,
    };

    let value: serde_json::Value = serde_json::from_str(raw.trim())?;
    if !value.is_object() {
        return Err(CliError::InvalidPayload);
    }
    Ok(value)
}

fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    if buffer.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(buffer))
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |stamp| stamp.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

/// Single-line payload preview for listings.
pub fn payload_preview(record: &Record, max_chars: usize) -> String {
    let rendered = record.payload.to_string();
    if rendered.chars().count() <= max_chars {
        rendered
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = rendered.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

#[derive(Debug, Serialize)]
pub struct RecordListItem {
    pub id: i64,
    pub remote_id: Option<i64>,
    pub sync_status: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub payload: serde_json::Value,
}

pub fn record_to_list_item(record: &Record) -> RecordListItem {
    RecordListItem {
        id: record.id,
        remote_id: record.remote_id,
        sync_status: record.sync_status.to_string(),
        created_at: record.created_at,
        updated_at: record.updated_at,
        payload: record.payload.clone(),
    }
}
