//! ---
//! mops_section: "07-query-pagination"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Query specification, backing-store boundary, and pagination engine."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{QueryError, Record, Result};

/// One page request: 1-based page number, page size, optional search term, and
/// conjunctive exact-match filters.
///
/// Built once per request; the builder methods consume the spec so an issued
/// spec cannot be changed underneath a running query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    page: u32,
    page_size: u32,
    #[serde(default)]
    search: Option<String>,
    #[serde(default)]
    filters: BTreeMap<String, Value>,
}

impl QuerySpec {
    /// Spec for `page` of `page_size` records with no search or filters.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            search: None,
            filters: BTreeMap::new(),
        }
    }

    /// Attach a free-text search term.
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Add an exact-match filter; a repeated field replaces the earlier value.
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    /// Same filters and search, different page.
    pub fn at_page(&self, page: u32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    /// Requested page (1-based).
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Requested page size.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Raw search term as supplied.
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Exact-match filters.
    pub fn filters(&self) -> &BTreeMap<String, Value> {
        &self.filters
    }

    /// Lower-cased, trimmed search term; `None` when absent or blank.
    pub fn normalized_search(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }

    /// Offset of the first record of the page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// Reject out-of-range page parameters. Values are never clamped.
    pub fn validate(&self, max_page_size: u32) -> Result<()> {
        if self.page == 0 {
            return Err(QueryError::InvalidArgument(
                "page must be at least 1".to_owned(),
            ));
        }
        if self.page_size == 0 {
            return Err(QueryError::InvalidArgument(
                "page size must be at least 1".to_owned(),
            ));
        }
        if self.page_size > max_page_size {
            return Err(QueryError::InvalidArgument(format!(
                "page size {} exceeds the maximum of {}",
                self.page_size, max_page_size
            )));
        }
        if self.filters.keys().any(|field| field.trim().is_empty()) {
            return Err(QueryError::InvalidArgument(
                "filter field names cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// One page of results plus the size of the whole filtered set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult<T = Record> {
    /// Records of this page, in query order.
    pub records: Vec<T>,
    /// Cardinality of the full filtered set.
    pub total: u64,
    /// Page number these records belong to.
    pub page: u32,
    /// Page size the page was cut with.
    pub page_size: u32,
}

impl<T> PageResult<T> {
    /// Assemble a page.
    pub fn new(records: Vec<T>, total: u64, page: u32, page_size: u32) -> Self {
        Self {
            records,
            total,
            page,
            page_size,
        }
    }

    /// Page with no matching records at all.
    pub fn empty(page: u32, page_size: u32) -> Self {
        Self::new(Vec::new(), 0, page, page_size)
    }

    /// `ceil(total / page_size)`.
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.page_size))
    }

    /// Whether a later page holds records.
    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }

    /// Whether the page lies beyond the last populated page.
    pub fn is_past_end(&self) -> bool {
        u64::from(self.page) > self.total_pages()
    }

    /// Number of records on this page.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether this page holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
