//! HTTP document store
//!
//! Speaks the OpenSearch-compatible REST API: `_search` with
//! aggregations, `_doc` get/put with sequence-number metadata, `_update`
//! guarded by `if_seq_no`/`if_primary_term`, and idempotent index
//! creation. One bounded timeout applies to every call.

use crate::error::StoreError;
use crate::search::{SearchRequest, SearchResponse};
use crate::store::DocumentStore;
use crate::version::{VersionToken, VersionedDocument};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

/// Default bound for any single store call
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for [`HttpStore`]
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Base endpoint, e.g. `https://search.example.com`
    pub endpoint: String,
    /// Basic-auth username
    pub username: Option<String>,
    /// Basic-auth password
    pub password: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl HttpStoreConfig {
    /// Settings for an unauthenticated endpoint with the default timeout
    #[inline]
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: None,
            password: None,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// With basic-auth credentials
    #[must_use]
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// With a per-request timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Reqwest-backed [`DocumentStore`]
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    config: HttpStoreConfig,
}

impl HttpStore {
    /// Build a store from connection settings
    pub fn connect(config: HttpStoreConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.config.username, &self.config.password) {
            (Some(user), Some(pass)) => builder.basic_auth(user, Some(pass)),
            _ => builder,
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout(self.config.timeout)
        } else {
            StoreError::QueryFailed(err.to_string())
        }
    }

    async fn read_failure(response: reqwest::Response) -> StoreError {
        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        StoreError::QueryFailed(format!("status {status}: {detail}"))
    }

    fn parse_token(body: &Value) -> Result<VersionToken, StoreError> {
        let seq_no = body
            .get("_seq_no")
            .and_then(Value::as_u64)
            .ok_or_else(|| StoreError::MalformedResponse("missing _seq_no".to_string()))?;
        let primary_term = body
            .get("_primary_term")
            .and_then(Value::as_u64)
            .ok_or_else(|| StoreError::MalformedResponse("missing _primary_term".to_string()))?;
        Ok(VersionToken::new(seq_no, primary_term))
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<SearchResponse, StoreError> {
        let url = self.url(&format!("{index}/_search"));
        tracing::debug!(%index, "executing search");

        let response = self
            .authorized(self.client.post(&url))
            .json(&request.to_body())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(Self::read_failure(response).await);
        }
        let body: Value = response.json().await.map_err(|e| self.transport_error(e))?;
        SearchResponse::from_body(&body)
    }

    async fn get(&self, index: &str, id: &str) -> Result<VersionedDocument, StoreError> {
        let url = self.url(&format!("{index}/_doc/{id}"));

        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                index: index.to_string(),
                id: id.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(Self::read_failure(response).await);
        }

        let body: Value = response.json().await.map_err(|e| self.transport_error(e))?;
        let source = body
            .get("_source")
            .cloned()
            .ok_or_else(|| StoreError::MalformedResponse("missing _source".to_string()))?;
        let token = Self::parse_token(&body)?;
        Ok(VersionedDocument::new(source, token))
    }

    async fn put(&self, index: &str, id: &str, document: &Value) -> Result<(), StoreError> {
        let url = self.url(&format!("{index}/_doc/{id}?refresh=true"));
        tracing::debug!(%index, %id, "indexing document");

        let response = self
            .authorized(self.client.put(&url))
            .json(document)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(Self::read_failure(response).await);
        }
        Ok(())
    }

    async fn update_conditional(
        &self,
        index: &str,
        id: &str,
        patch: &Value,
        token: VersionToken,
    ) -> Result<VersionToken, StoreError> {
        let url = self.url(&format!(
            "{index}/_update/{id}?if_seq_no={}&if_primary_term={}&refresh=true",
            token.seq_no(),
            token.primary_term()
        ));

        let response = self
            .authorized(self.client.post(&url))
            .json(&json!({"doc": patch}))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        match response.status() {
            StatusCode::CONFLICT => Err(StoreError::VersionConflict {
                index: index.to_string(),
                id: id.to_string(),
            }),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound {
                index: index.to_string(),
                id: id.to_string(),
            }),
            status if status.is_success() => {
                let body: Value = response.json().await.map_err(|e| self.transport_error(e))?;
                Self::parse_token(&body)
            }
            _ => Err(Self::read_failure(response).await),
        }
    }

    async fn ensure_index(&self, index: &str, schema: &Value) -> Result<(), StoreError> {
        let url = self.url(index);

        let head = self
            .authorized(self.client.head(&url))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        if head.status().is_success() {
            return Ok(());
        }

        tracing::info!(%index, "creating index");
        let response = self
            .authorized(self.client.put(&url))
            .json(schema)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if response.status().is_success() {
            return Ok(());
        }
        // A concurrent creator may have won the race.
        let detail = response.text().await.unwrap_or_default();
        if detail.contains("resource_already_exists_exception") {
            return Ok(());
        }
        Err(StoreError::QueryFailed(format!("index creation failed: {detail}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = HttpStoreConfig::new("https://search.example.com");
        assert_eq!(config.timeout, DEFAULT_QUERY_TIMEOUT);
        assert!(config.username.is_none());
    }

    #[test]
    fn url_joining_trims_trailing_slash() {
        let store = HttpStore::connect(HttpStoreConfig::new("https://search.example.com/")).unwrap();
        assert_eq!(
            store.url("app-logs/_search"),
            "https://search.example.com/app-logs/_search"
        );
    }

    #[test]
    fn credentials_builder() {
        let config = HttpStoreConfig::new("https://search.example.com")
            .with_basic_auth("monitor", "secret")
            .with_timeout(Duration::from_secs(2));
        assert_eq!(config.username.as_deref(), Some("monitor"));
        assert_eq!(config.timeout, Duration::from_secs(2));
    }
}
