//! Testing utilities for the Causeway workspace
//!
//! Shared test doubles and fixtures: an in-memory document store with
//! real compare-and-swap semantics plus a programmable search queue, and
//! builders for the aggregation trees the engines consume.

#![allow(missing_docs)]

use async_trait::async_trait;
use causeway_store::{
    AggBucket, AggResult, DocumentStore, SearchRequest, SearchResponse, StoreError, VersionToken,
    VersionedDocument,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredDocument {
    source: Value,
    token: VersionToken,
}

/// In-memory [`DocumentStore`]
///
/// Documents are versioned with an incrementing sequence number and a
/// fixed primary term, and `update_conditional` enforces real
/// compare-and-swap semantics, so concurrency behavior matches the wire
/// store. Searches pop canned responses from a FIFO queue (empty
/// response when the queue runs dry); executed requests are recorded for
/// assertions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    indices: DashMap<String, DashMap<String, StoredDocument>>,
    schemas: DashMap<String, Value>,
    responses: Mutex<VecDeque<Result<SearchResponse, String>>>,
    searches: Mutex<Vec<(String, Value)>>,
    next_seq_no: AtomicU64,
    forced_conflicts: AtomicU64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a canned response for the next search
    pub fn push_search(&self, response: SearchResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue a failure for the next search
    pub fn push_search_failure(&self, message: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Err(message.into()));
    }

    /// Request bodies of every search executed so far, in order
    #[must_use]
    pub fn executed_searches(&self) -> Vec<(String, Value)> {
        self.searches.lock().unwrap().clone()
    }

    /// Current revision of a stored document, if present
    #[must_use]
    pub fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.indices
            .get(index)
            .and_then(|docs| docs.get(id).map(|d| d.source.clone()))
    }

    /// Whether `ensure_index` ran for this index
    #[must_use]
    pub fn has_index(&self, index: &str) -> bool {
        self.schemas.contains_key(index)
    }

    /// Force the next `n` conditional updates to report a version conflict
    pub fn inject_conflicts(&self, n: u64) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    fn next_token(&self) -> VersionToken {
        VersionToken::new(self.next_seq_no.fetch_add(1, Ordering::SeqCst), 1)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<SearchResponse, StoreError> {
        self.searches
            .lock()
            .unwrap()
            .push((index.to_string(), request.to_body()));
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(StoreError::QueryFailed(message)),
            None => Ok(SearchResponse::empty()),
        }
    }

    async fn get(&self, index: &str, id: &str) -> Result<VersionedDocument, StoreError> {
        self.indices
            .get(index)
            .and_then(|docs| {
                docs.get(id)
                    .map(|d| VersionedDocument::new(d.source.clone(), d.token))
            })
            .ok_or_else(|| StoreError::NotFound {
                index: index.to_string(),
                id: id.to_string(),
            })
    }

    async fn put(&self, index: &str, id: &str, document: &Value) -> Result<(), StoreError> {
        let docs = self.indices.entry(index.to_string()).or_default();
        docs.insert(
            id.to_string(),
            StoredDocument {
                source: document.clone(),
                token: self.next_token(),
            },
        );
        Ok(())
    }

    async fn update_conditional(
        &self,
        index: &str,
        id: &str,
        patch: &Value,
        token: VersionToken,
    ) -> Result<VersionToken, StoreError> {
        let docs = self.indices.get(index).ok_or_else(|| StoreError::NotFound {
            index: index.to_string(),
            id: id.to_string(),
        })?;
        let mut doc = docs.get_mut(id).ok_or_else(|| StoreError::NotFound {
            index: index.to_string(),
            id: id.to_string(),
        })?;

        if self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::VersionConflict {
                index: index.to_string(),
                id: id.to_string(),
            });
        }

        if doc.token != token {
            return Err(StoreError::VersionConflict {
                index: index.to_string(),
                id: id.to_string(),
            });
        }

        if let (Some(target), Some(fields)) = (doc.source.as_object_mut(), patch.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        doc.token = self.next_token();
        Ok(doc.token)
    }

    async fn ensure_index(&self, index: &str, schema: &Value) -> Result<(), StoreError> {
        self.schemas
            .entry(index.to_string())
            .or_insert_with(|| schema.clone());
        self.indices.entry(index.to_string()).or_default();
        Ok(())
    }
}

/// Build a terms bucket with nested aggregations
#[must_use]
pub fn bucket(key: &str, doc_count: u64, aggs: Vec<(&str, AggResult)>) -> AggBucket {
    AggBucket {
        key: key.to_string(),
        timestamp: None,
        doc_count,
        aggregations: aggs
            .into_iter()
            .map(|(name, result)| (name.to_string(), result))
            .collect(),
    }
}

/// Build a date-histogram bucket
#[must_use]
pub fn time_bucket(timestamp: DateTime<Utc>, doc_count: u64) -> AggBucket {
    AggBucket {
        key: timestamp.to_rfc3339(),
        timestamp: Some(timestamp),
        doc_count,
        aggregations: IndexMap::new(),
    }
}

/// Build a terms aggregation result from `(key, count)` pairs
#[must_use]
pub fn terms_result(counts: &[(&str, u64)]) -> AggResult {
    AggResult::Buckets(
        counts
            .iter()
            .map(|(key, count)| AggBucket::new(*key, *count))
            .collect(),
    )
}

/// Build the correlation-query response shape
///
/// Each entry is `(service, total, error-type counts, timeline)`.
#[must_use]
pub fn correlation_response(
    services: &[(&str, u64, &[(&str, u64)], &[(DateTime<Utc>, u64)])],
) -> SearchResponse {
    let buckets: Vec<AggBucket> = services
        .iter()
        .map(|(service, total, types, timeline)| {
            bucket(
                service,
                *total,
                vec![
                    ("by_error_type", terms_result(types)),
                    (
                        "error_timeline",
                        AggResult::Buckets(
                            timeline.iter().map(|(t, c)| time_bucket(*t, *c)).collect(),
                        ),
                    ),
                    ("error_samples", AggResult::Hits(Vec::new())),
                ],
            )
        })
        .collect();

    SearchResponse {
        total: services.iter().map(|(_, total, _, _)| *total).sum(),
        hits: Vec::new(),
        aggregations: [(
            "by_service".to_string(),
            AggResult::Buckets(buckets),
        )]
        .into_iter()
        .collect(),
    }
}

/// Build an impact-window response: a total plus a status-code histogram
#[must_use]
pub fn count_response(total: u64, status_codes: &[(&str, u64)]) -> SearchResponse {
    SearchResponse {
        total,
        hits: Vec::new(),
        aggregations: [("status_codes".to_string(), terms_result(status_codes))]
            .into_iter()
            .collect(),
    }
}

/// Build a baseline-query response: one bucket per day
#[must_use]
pub fn daily_histogram_response(days: &[(DateTime<Utc>, u64)]) -> SearchResponse {
    SearchResponse {
        total: days.iter().map(|(_, count)| *count).sum(),
        hits: Vec::new(),
        aggregations: [(
            "errors_per_day".to_string(),
            AggResult::Buckets(days.iter().map(|(t, c)| time_bucket(*t, *c)).collect()),
        )]
        .into_iter()
        .collect(),
    }
}

/// Build a deployment-detection response from raw hit sources
#[must_use]
pub fn hits_response(hits: Vec<Value>) -> SearchResponse {
    SearchResponse {
        total: hits.len() as u64,
        hits,
        aggregations: IndexMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let store = MemoryStore::new();
        store
            .put("findings", "f1", &json!({"status": "pending_review"}))
            .await
            .unwrap();

        let doc = store.get("findings", "f1").await.unwrap();
        assert_eq!(doc.source["status"], json!("pending_review"));
    }

    #[tokio::test]
    async fn conditional_update_enforces_token() {
        let store = MemoryStore::new();
        store.put("findings", "f1", &json!({"status": "a"})).await.unwrap();

        let first = store.get("findings", "f1").await.unwrap();
        let new_token = store
            .update_conditional("findings", "f1", &json!({"status": "b"}), first.token)
            .await
            .unwrap();
        assert_ne!(new_token, first.token);

        // The stale token must now be rejected.
        let err = store
            .update_conditional("findings", "f1", &json!({"status": "c"}), first.token)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.document("findings", "f1").unwrap()["status"], json!("b"));
    }

    #[tokio::test]
    async fn update_merges_partial_document() {
        let store = MemoryStore::new();
        store
            .put("findings", "f1", &json!({"status": "a", "title": "t"}))
            .await
            .unwrap();
        let doc = store.get("findings", "f1").await.unwrap();
        store
            .update_conditional("findings", "f1", &json!({"status": "b"}), doc.token)
            .await
            .unwrap();

        let merged = store.document("findings", "f1").unwrap();
        assert_eq!(merged["status"], json!("b"));
        assert_eq!(merged["title"], json!("t"));
    }

    #[tokio::test]
    async fn search_queue_pops_in_order() {
        let store = MemoryStore::new();
        store.push_search(count_response(3, &[]));
        store.push_search_failure("unreachable");

        let request = SearchRequest::counts();
        let first = store.search("logs", &request).await.unwrap();
        assert_eq!(first.total, 3);
        let second = store.search("logs", &request).await.unwrap_err();
        assert!(matches!(second, StoreError::QueryFailed(_)));
        // Queue exhausted: empty response, not an error.
        let third = store.search("logs", &request).await.unwrap();
        assert_eq!(third.total, 0);
        assert_eq!(store.executed_searches().len(), 3);
    }

    #[tokio::test]
    async fn ensure_index_is_idempotent() {
        let store = MemoryStore::new();
        let schema = json!({"mappings": {}});
        store.ensure_index("findings", &schema).await.unwrap();
        store.ensure_index("findings", &json!({"other": true})).await.unwrap();
        assert!(store.has_index("findings"));
    }
}
