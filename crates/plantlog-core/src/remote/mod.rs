//! Remote API boundary
//!
//! The sync engine consumes the remote side through the [`RemoteApi`] trait;
//! production code uses the reqwest-backed [`HttpRemoteClient`], tests
//! substitute an in-memory fake.

mod http;

pub use http::HttpRemoteClient;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Collection;

/// Errors surfaced by remote calls. Each is a per-call failure the sync
/// engine records and moves past, never a process-level abort.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Authentication rejected by remote server (401)")]
    Unauthorized,
    #[error("Remote API error: {0}")]
    Api(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// A record as the remote API represents it: a server identity, an
/// update stamp, and otherwise opaque fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Server-assigned identity
    pub id: i64,
    /// Server-side update stamp (Unix ms); last-write-wins basis
    pub updated_at: i64,
    /// Everything else the record carries, untouched
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl RemoteRecord {
    /// The opaque business payload as a JSON value.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::Value::Object(self.fields.clone())
    }

    /// The remote creation stamp, when the payload happens to carry one.
    pub fn created_at_hint(&self) -> Option<i64> {
        self.fields.get("created_at").and_then(serde_json::Value::as_i64)
    }
}

/// One page of a remote listing.
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePage {
    pub data: Vec<RemoteRecord>,
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: u64,
}

/// Authenticated CRUD surface of the remote API, per collection.
#[allow(async_fn_in_trait)]
pub trait RemoteApi {
    /// Fetch one page of the collection listing.
    async fn list(&self, collection: Collection, page: u32, per_page: u32)
        -> RemoteResult<RemotePage>;

    /// Fetch a single record by its remote identity.
    async fn get(&self, collection: Collection, remote_id: i64) -> RemoteResult<RemoteRecord>;

    /// Create a remote record; returns the server-assigned identity.
    async fn create(
        &self,
        collection: Collection,
        payload: &serde_json::Value,
    ) -> RemoteResult<i64>;

    /// Replace a remote record's content.
    async fn update(
        &self,
        collection: Collection,
        remote_id: i64,
        payload: &serde_json::Value,
    ) -> RemoteResult<()>;

    /// Delete a remote record.
    async fn delete(&self, collection: Collection, remote_id: i64) -> RemoteResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_record_payload_keeps_unknown_fields() {
        let record: RemoteRecord = serde_json::from_value(serde_json::json!({
            "id": 42,
            "updated_at": 1_700_000_000_000i64,
            "form_data": {"operator": "A. Weaver"},
            "created_at": 1_699_000_000_000i64
        }))
        .unwrap();

        assert_eq!(record.id, 42);
        assert_eq!(record.updated_at, 1_700_000_000_000);
        assert_eq!(record.created_at_hint(), Some(1_699_000_000_000));
        assert_eq!(
            record.payload()["form_data"]["operator"],
            serde_json::json!("A. Weaver")
        );
    }
}
