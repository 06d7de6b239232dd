//! The `DocumentStore` trait
//!
//! The one seam between the engines and the backing store. All calls are
//! bounded-latency network operations; implementations apply a single
//! configurable timeout and surface failures as typed errors, never as
//! partial data.

use crate::error::StoreError;
use crate::search::{SearchRequest, SearchResponse};
use crate::version::{VersionToken, VersionedDocument};
use async_trait::async_trait;
use serde_json::Value;

/// Operations the core requires from its document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Execute a search with aggregations against an index
    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<SearchResponse, StoreError>;

    /// Fetch a document and the token of its current revision
    async fn get(&self, index: &str, id: &str) -> Result<VersionedDocument, StoreError>;

    /// Index a document under an explicit id (create or replace)
    async fn put(&self, index: &str, id: &str, document: &Value) -> Result<(), StoreError>;

    /// Merge a partial document into an existing one, guarded by the token
    ///
    /// Fails with [`StoreError::VersionConflict`] when the stored revision
    /// no longer matches `token`; on success returns the token of the new
    /// revision.
    async fn update_conditional(
        &self,
        index: &str,
        id: &str,
        patch: &Value,
        token: VersionToken,
    ) -> Result<VersionToken, StoreError>;

    /// Create an index with the given schema; a no-op if it already exists
    async fn ensure_index(&self, index: &str, schema: &Value) -> Result<(), StoreError>;
}
