//! Sync history model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which phases a recorded run executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    /// Push then pull for every enabled collection
    All,
    /// Push phases only
    Push,
    /// Pull phases only
    Pull,
}

impl SyncType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Push => "push",
            Self::Pull => "pull",
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "push" => Ok(Self::Push),
            "pull" => Ok(Self::Pull),
            other => Err(format!("unknown sync type: {other}")),
        }
    }
}

/// Recorded outcome of a run, derived purely from the error count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    Success,
    Partial,
    Failed,
}

impl SyncOutcome {
    /// Zero errors is success, one or two is partial, three or more failed.
    pub const fn from_error_count(count: usize) -> Self {
        match count {
            0 => Self::Success,
            1 | 2 => Self::Partial,
            _ => Self::Failed,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown sync outcome: {other}")),
        }
    }
}

/// One immutable audit entry per sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncHistoryEntry {
    /// History row identifier
    pub id: i64,
    /// Phases executed
    pub sync_type: SyncType,
    /// Derived outcome
    pub outcome: SyncOutcome,
    /// Records pushed to the remote side
    pub uploaded: u32,
    /// Records created or overwritten locally from the remote side
    pub downloaded: u32,
    /// Conflicts detected during the run
    pub conflicts: u32,
    /// Per-record and per-phase error messages
    pub errors: Vec<String>,
    /// Run start (Unix ms)
    pub started_at: i64,
    /// Run completion (Unix ms)
    pub completed_at: i64,
}
