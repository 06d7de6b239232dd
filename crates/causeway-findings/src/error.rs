//! Error types for finding lifecycle operations
//!
//! Lifecycle transitions are strict: any failure to durably persist a
//! transition is surfaced to the caller. An already-handled finding is
//! not an error; it is reported as a no-op outcome.

use crate::finding::{FindingId, FindingStatus};
use causeway_store::StoreError;

/// Failures of a lifecycle transition
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    /// No finding exists under this id
    #[error("finding not found: {0}")]
    NotFound(FindingId),

    /// The retry budget ran out while the document kept moving underneath
    #[error("version conflict persisted after {attempts} attempts")]
    ConflictExhausted { attempts: usize },

    /// The requested edge is not in the transition graph
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition {
        from: FindingStatus,
        to: FindingStatus,
    },

    /// The stored document does not parse as a finding
    #[error("invalid finding document: {0}")]
    Document(#[from] serde_json::Error),

    /// The store failed outside of conflict handling
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for TransitionError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { id, .. } => TransitionError::NotFound(FindingId::from(id)),
            other => TransitionError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_finding_not_found() {
        let err: TransitionError = StoreError::NotFound {
            index: "findings".to_string(),
            id: "f1".to_string(),
        }
        .into();
        assert!(matches!(err, TransitionError::NotFound(id) if id.as_str() == "f1"));
    }

    #[test]
    fn conflict_exhaustion_message() {
        let err = TransitionError::ConflictExhausted { attempts: 3 };
        assert_eq!(err.to_string(), "version conflict persisted after 3 attempts");
    }
}
