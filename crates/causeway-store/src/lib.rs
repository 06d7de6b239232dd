//! Causeway Store - document-store contract
//!
//! Defines everything the analysis and lifecycle layers need from the
//! backing document store:
//! - A typed search model (range/term filters plus nested aggregations)
//! - Version tokens for optimistic-concurrency control
//! - The `DocumentStore` trait with conditional update semantics
//! - An HTTP implementation speaking an OpenSearch-compatible REST API

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod http;
pub mod search;
pub mod store;
pub mod version;

pub use error::StoreError;
pub use http::{HttpStore, HttpStoreConfig};
pub use search::{AggBucket, AggResult, Aggregation, SearchRequest, SearchResponse};
pub use store::DocumentStore;
pub use version::{VersionToken, VersionedDocument};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
