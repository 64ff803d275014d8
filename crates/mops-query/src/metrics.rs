//! ---
//! mops_section: "07-query-pagination"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Query specification, backing-store boundary, and pagination engine."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use std::sync::Arc;

use prometheus::{IntCounterVec, Opts, Registry};

/// Metrics published by the pagination engine.
#[derive(Clone)]
pub struct QueryMetrics {
    page_queries: IntCounterVec,
    page_query_failures: IntCounterVec,
    #[allow(dead_code)]
    registry: Arc<Registry>,
}

impl QueryMetrics {
    /// Register all query metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> prometheus::Result<Self> {
        let page_queries = IntCounterVec::new(
            Opts::new("page_queries_total", "Total page queries served"),
            &["collection"],
        )?;
        registry.register(Box::new(page_queries.clone()))?;

        let page_query_failures = IntCounterVec::new(
            Opts::new(
                "page_query_failures_total",
                "Page queries rejected or failed by the backing store",
            ),
            &["collection", "reason"],
        )?;
        registry.register(Box::new(page_query_failures.clone()))?;

        Ok(Self {
            page_queries,
            page_query_failures,
            registry,
        })
    }

    /// Record a page served for `collection`.
    pub fn record_page(&self, collection: &str) {
        self.page_queries.with_label_values(&[collection]).inc();
    }

    /// Record a failed page query.
    pub fn record_failure(&self, collection: &str, reason: &str) {
        self.page_query_failures
            .with_label_values(&[collection, reason])
            .inc();
    }

    /// Pages served so far for `collection`.
    pub fn pages_served(&self, collection: &str) -> u64 {
        self.page_queries.with_label_values(&[collection]).get()
    }

    /// Failures recorded so far for `collection` and `reason`.
    pub fn failures(&self, collection: &str, reason: &str) -> u64 {
        self.page_query_failures
            .with_label_values(&[collection, reason])
            .get()
    }
}
