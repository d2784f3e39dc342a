pub mod error;

use std::time::Duration;

use error::EsClientError;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Aggregation queries against a large index can legitimately run for a
/// while; this only bounds a wedged connection.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteByQueryResponse {
    pub deleted: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkResponse {
    pub took: Option<u64>,
    /// True if any single operation in the batch was rejected
    pub errors: bool,
}

/// Thin client for the document store: search, delete-by-query and NDJSON
/// bulk writes. Everything else about the store is opaque to this crate.
pub struct EsClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl EsClient {
    pub fn new(url: &str, username: &str, password: &str) -> Result<Self, EsClientError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub async fn search<B, R>(&self, index: &str, body: &B) -> Result<R, EsClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}/_search", self.base_url, index);
        self.post_json(&url, body).await
    }

    pub async fn delete_by_query<B>(
        &self,
        index: &str,
        body: &B,
    ) -> Result<DeleteByQueryResponse, EsClientError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}/{}/_delete_by_query", self.base_url, index);
        self.post_json(&url, body).await
    }

    pub async fn bulk(&self, index: &str, ndjson: String) -> Result<BulkResponse, EsClientError> {
        let url = format!("{}/{}/_bulk", self.base_url, index);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(ndjson)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, EsClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, EsClientError> {
        let status = response.status();
        let url = response.url().to_string();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EsClientError::UnexpectedStatus { status, url, body });
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}
