use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] plantlog_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No payload provided (pass --payload or pipe JSON on stdin)")]
    EmptyPayload,
    #[error("Record payload must be a JSON object")]
    InvalidPayload,
    #[error("Record not found: {0}")]
    RecordNotFound(i64),
    #[error("Auto-sync is disabled. Enable it with `plantlog config set --auto-sync true`.")]
    AutoSyncDisabled,
}
