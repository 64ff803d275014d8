//! ---
//! mops_section: "07-query-pagination"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Query specification, backing-store boundary, and pagination engine."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
#![warn(missing_docs)]

use std::time::Duration;

/// A stored row: a JSON object carrying at least `id` and `created_at`.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Result alias used throughout the query crate.
pub type Result<T> = std::result::Result<T, QueryError>;

/// Failures surfaced by the pagination engine.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Malformed query spec or unknown collection; rejected before any store access.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The backing store failed or timed out. Never retried here.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

/// Failures reported by a [`RecordStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("backing store unreachable: {0}")]
    Unreachable(String),
    /// The store did not answer in time.
    #[error("backing store timed out after {0:?}")]
    Timeout(Duration),
    /// No record with the given id.
    #[error("record not found: {collection}/{id}")]
    NotFound {
        /// Collection searched.
        collection: String,
        /// Missing id.
        id: String,
    },
    /// The store refused the write.
    #[error("record rejected: {0}")]
    Rejected(String),
    /// Wrapper for JSON (de)serialization issues.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// Wrapper for IO errors while loading seed data.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub mod collection;
pub mod engine;
pub mod metrics;
pub mod spec;
pub mod stats;
pub mod store;

pub use collection::{CollectionRegistry, CollectionSchema, SortOrder};
pub use engine::QueryEngine;
pub use metrics::QueryMetrics;
pub use spec::{PageResult, QuerySpec};
pub use stats::LeadStats;
pub use store::{MemoryStore, RecordStore, StoreQuery, StoreSlice};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_convert_to_unavailable() {
        let err: QueryError = StoreError::Timeout(Duration::from_millis(1500)).into();
        assert!(matches!(err, QueryError::StoreUnavailable(_)));
        assert_eq!(
            err.to_string(),
            "store unavailable: backing store timed out after 1.5s"
        );
    }
}
