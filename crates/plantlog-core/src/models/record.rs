//! Record envelope shared by all collections

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Synchronization state of a local row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Content matches the last successfully transferred copy.
    Synced,
    /// Local changes (new, edited, or deleted row) not yet reflected remotely.
    Pending,
    /// Local and remote diverged; awaiting manual resolution.
    Conflict,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Conflict => "conflict",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "synced" => Ok(Self::Synced),
            "pending" => Ok(Self::Pending),
            "conflict" => Ok(Self::Conflict),
            other => Err(format!("unknown sync status: {other}")),
        }
    }
}

/// A captured record: an opaque payload plus the sync envelope.
///
/// The payload carries the business fields (form data, measurements,
/// metadata); the sync machinery reads only the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Local identity, assigned on creation, never reused
    pub id: i64,
    /// Remote identity once accepted by the server; None means never pushed
    pub remote_id: Option<i64>,
    /// Opaque JSON payload
    pub payload: serde_json::Value,
    /// Synchronization state
    pub sync_status: SyncStatus,
    /// Last successful reconciliation with the remote copy (Unix ms)
    pub last_synced_at: Option<i64>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last local update (Unix ms); basis for last-write-wins comparison
    pub updated_at: i64,
    /// Soft-delete marker (Unix ms)
    pub deleted_at: Option<i64>,
}

impl Record {
    /// Whether this row has been soft-deleted locally.
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Input for creating a local row.
///
/// Envelope fields default to a freshly captured pending record; the sync
/// engine overrides them when mirroring a remote row.
#[derive(Debug, Clone, Default)]
pub struct NewRecord {
    pub payload: serde_json::Value,
    pub remote_id: Option<i64>,
    pub sync_status: Option<SyncStatus>,
    pub last_synced_at: Option<i64>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl NewRecord {
    /// A locally captured record: pending, never pushed.
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            ..Self::default()
        }
    }
}

/// Partial update of a local row. Absent fields are preserved.
///
/// `updated_at` overrides the stamp applied by the store; when `None` the
/// store stamps the current time. The sync engine passes an explicit stamp
/// so bookkeeping transitions do not disturb last-write-wins ordering.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub payload: Option<serde_json::Value>,
    pub remote_id: Option<i64>,
    pub sync_status: Option<SyncStatus>,
    pub last_synced_at: Option<i64>,
    pub updated_at: Option<i64>,
}

/// Optional constraints for listing records.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Free-text match against the serialized payload
    pub search: Option<String>,
    /// Lower bound on `created_at` (inclusive, Unix ms)
    pub created_from: Option<i64>,
    /// Upper bound on `created_at` (inclusive, Unix ms)
    pub created_to: Option<i64>,
}

impl ListFilter {
    pub const fn is_empty(&self) -> bool {
        self.search.is_none() && self.created_from.is_none() && self.created_to.is_none()
    }
}

/// One page of a listing, with the metadata the UI needs for paging.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_status_round_trip() {
        for status in [SyncStatus::Synced, SyncStatus::Pending, SyncStatus::Conflict] {
            let parsed: SyncStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("bogus".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn test_new_record_defaults() {
        let new = NewRecord::new(serde_json::json!({"force": 12.5}));
        assert!(new.remote_id.is_none());
        assert!(new.sync_status.is_none());
        assert!(new.created_at.is_none());
    }

    #[test]
    fn test_empty_filter() {
        assert!(ListFilter::default().is_empty());
        let filter = ListFilter {
            search: Some("coil".to_string()),
            ..ListFilter::default()
        };
        assert!(!filter.is_empty());
    }
}
