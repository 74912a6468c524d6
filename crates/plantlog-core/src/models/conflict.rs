//! Sync conflict model

use serde::{Deserialize, Serialize};

use super::{Collection, Record};
use crate::remote::RemoteRecord;

/// Composite conflict key: `{collection}-{localId}`.
///
/// One open conflict per local row; a second detection for the same row
/// replaces the first.
pub fn conflict_id(collection: Collection, local_id: i64) -> String {
    format!("{collection}-{local_id}")
}

/// A detected local/remote divergence awaiting manual resolution.
///
/// Both sides are stored in full so `remote` resolution can restore content
/// without a network call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Composite key `{collection}-{localId}`
    pub id: String,
    /// Collection the divergent row belongs to
    pub collection: Collection,
    /// Local row identity
    pub local_id: i64,
    /// Local snapshot at detection time
    pub local: Record,
    /// Remote snapshot at detection time
    pub remote: RemoteRecord,
    /// Detection timestamp (Unix ms)
    pub detected_at: i64,
}

impl SyncConflict {
    pub fn new(collection: Collection, local: Record, remote: RemoteRecord, detected_at: i64) -> Self {
        Self {
            id: conflict_id(collection, local.id),
            collection,
            local_id: local.id,
            local,
            remote,
            detected_at,
        }
    }
}
