//! Version tokens for optimistic concurrency
//!
//! A token identifies one revision of a stored document. Conditional
//! updates succeed only while the token matches the store's current
//! revision; callers treat the pair as opaque.

use serde::{Deserialize, Serialize};

/// Opaque two-part revision identifier (sequence number + primary term)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionToken {
    seq_no: u64,
    primary_term: u64,
}

impl VersionToken {
    /// Create a token from its store-reported parts
    #[inline]
    #[must_use]
    pub fn new(seq_no: u64, primary_term: u64) -> Self {
        Self { seq_no, primary_term }
    }

    /// Sequence-number part
    #[inline]
    #[must_use]
    pub fn seq_no(&self) -> u64 {
        self.seq_no
    }

    /// Primary-term part
    #[inline]
    #[must_use]
    pub fn primary_term(&self) -> u64 {
        self.primary_term
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.seq_no, self.primary_term)
    }
}

/// A document together with the token of the revision that was read
#[derive(Debug, Clone)]
pub struct VersionedDocument {
    /// Document body
    pub source: serde_json::Value,
    /// Revision token for conditional updates
    pub token: VersionToken,
}

impl VersionedDocument {
    /// Create a versioned document
    #[inline]
    #[must_use]
    pub fn new(source: serde_json::Value, token: VersionToken) -> Self {
        Self { source, token }
    }
}
