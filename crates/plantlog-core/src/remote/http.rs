//! reqwest-backed remote API client

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use super::{RemoteApi, RemoteError, RemotePage, RemoteRecord, RemoteResult};
use crate::models::Collection;

const HTTP_TIMEOUT_SECS: u64 = 30;

/// Thin authenticated wrapper around the remote REST API.
#[derive(Clone, Debug)]
pub struct HttpRemoteClient {
    base_url: String,
    auth_token: String,
    client: reqwest::Client,
}

impl HttpRemoteClient {
    pub fn new(server_url: impl Into<String>, auth_token: impl Into<String>) -> RemoteResult<Self> {
        let base_url = normalize_base_url(server_url.into())?;
        let auth_token = auth_token.into().trim().to_string();
        if auth_token.is_empty() {
            return Err(RemoteError::InvalidConfiguration(
                "auth token must not be empty".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            auth_token,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
                .build()?,
        })
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!("{}/{}", self.base_url, collection.remote_path())
    }

    fn record_url(&self, collection: Collection, remote_id: i64) -> String {
        format!("{}/{remote_id}", self.collection_url(collection))
    }

    /// Finish-earlier sessions have no single create endpoint: the session
    /// is started first, then each entry is appended individually.
    async fn create_finish_earlier(&self, payload: &serde_json::Value) -> RemoteResult<i64> {
        let mut body = payload.as_object().cloned().unwrap_or_default();
        let entries = match body.remove("entries") {
            Some(serde_json::Value::Array(list)) => list,
            _ => Vec::new(),
        };

        let start_url = format!("{}/start", self.collection_url(Collection::FinishEarlier));
        let response = self
            .client
            .post(&start_url)
            .bearer_auth(&self.auth_token)
            .json(&serde_json::Value::Object(body))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let remote_id = parse_created_id(response).await?;

        let entries_url = format!(
            "{}/{remote_id}/entries",
            self.collection_url(Collection::FinishEarlier)
        );
        for entry in &entries {
            let response = self
                .client
                .post(&entries_url)
                .bearer_auth(&self.auth_token)
                .json(entry)
                .send()
                .await?;
            ensure_success(response).await?;
        }

        Ok(remote_id)
    }
}

impl RemoteApi for HttpRemoteClient {
    async fn list(
        &self,
        collection: Collection,
        page: u32,
        per_page: u32,
    ) -> RemoteResult<RemotePage> {
        let response = self
            .client
            .get(self.collection_url(collection))
            .bearer_auth(&self.auth_token)
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await?;
        let response = ensure_success(response).await?;

        Ok(response.json::<RemotePage>().await?)
    }

    async fn get(&self, collection: Collection, remote_id: i64) -> RemoteResult<RemoteRecord> {
        let response = self
            .client
            .get(self.record_url(collection, remote_id))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let payload = response.json::<ShowResponse>().await?;
        Ok(payload.data)
    }

    async fn create(
        &self,
        collection: Collection,
        payload: &serde_json::Value,
    ) -> RemoteResult<i64> {
        if collection == Collection::FinishEarlier {
            return self.create_finish_earlier(payload).await;
        }

        let response = self
            .client
            .post(self.collection_url(collection))
            .bearer_auth(&self.auth_token)
            .json(payload)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        parse_created_id(response).await
    }

    async fn update(
        &self,
        collection: Collection,
        remote_id: i64,
        payload: &serde_json::Value,
    ) -> RemoteResult<()> {
        let response = self
            .client
            .put(self.record_url(collection, remote_id))
            .bearer_auth(&self.auth_token)
            .json(payload)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        ensure_acknowledged(response).await
    }

    async fn delete(&self, collection: Collection, remote_id: i64) -> RemoteResult<()> {
        let response = self
            .client
            .delete(self.record_url(collection, remote_id))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        ensure_acknowledged(response).await
    }
}

#[derive(Debug, Deserialize)]
struct ShowResponse {
    data: RemoteRecord,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    status: Option<bool>,
    success: Option<bool>,
    data: Option<CreatedData>,
}

#[derive(Debug, Deserialize)]
struct CreatedData {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct AckResponse {
    success: Option<bool>,
    status: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

async fn ensure_success(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(RemoteError::Unauthorized);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RemoteError::Api(parse_api_error(status, &body)));
    }
    Ok(response)
}

async fn parse_created_id(response: reqwest::Response) -> RemoteResult<i64> {
    let payload = response.json::<CreateResponse>().await?;
    if payload.status.or(payload.success) == Some(false) {
        return Err(RemoteError::Api("remote rejected the record".to_string()));
    }
    payload
        .data
        .map(|data| data.id)
        .ok_or_else(|| RemoteError::InvalidPayload("response did not include data.id".to_string()))
}

async fn ensure_acknowledged(response: reqwest::Response) -> RemoteResult<()> {
    let ack = response.json::<AckResponse>().await?;
    if ack.success.or(ack.status) == Some(false) {
        return Err(RemoteError::Api("remote reported failure".to_string()));
    }
    Ok(())
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> RemoteResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RemoteError::InvalidConfiguration(
            "server URL must not be empty".to_string(),
        ));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::InvalidConfiguration(
            "server URL must include http:// or https://".to_string(),
        ))
    }
}
