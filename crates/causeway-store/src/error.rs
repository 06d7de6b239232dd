//! Error types for store operations
//!
//! Every store failure is a typed error; the store never returns partial
//! data on failure. Version conflicts are distinguishable so callers can
//! re-read and retry.

use std::time::Duration;

/// Store error taxonomy
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store unreachable or the request was rejected
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Document does not exist
    #[error("document not found: {index}/{id}")]
    NotFound { index: String, id: String },

    /// Conditional update rejected because the supplied version token is stale
    #[error("version conflict on {index}/{id}")]
    VersionConflict { index: String, id: String },

    /// Request exceeded the bounded timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Response did not match the expected shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Document (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client could not be constructed
    #[error("client construction failed: {0}")]
    Client(String),
}

impl StoreError {
    /// Check if this error is a version conflict (recoverable via re-read)
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }

    /// Check if this error is a missing document
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
