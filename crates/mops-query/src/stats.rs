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

use crate::Record;

/// Lead statuses always present in the breakdown, even at zero.
pub const LEAD_STATUSES: &[&str] = &["pending", "completed", "remainder"];
/// Lead sources always present in the breakdown, even at zero.
pub const LEAD_SOURCES: &[&str] = &["facebook", "linkedin", "form", "seo", "website"];

const UNSET: &str = "unset";

/// Dashboard lead counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadStats {
    /// Number of leads counted.
    pub total: u64,
    /// Leads per `status` value.
    pub by_status: BTreeMap<String, u64>,
    /// Leads per `source` value.
    pub by_source: BTreeMap<String, u64>,
}

impl Default for LeadStats {
    fn default() -> Self {
        Self {
            total: 0,
            by_status: seed(LEAD_STATUSES),
            by_source: seed(LEAD_SOURCES),
        }
    }
}

impl LeadStats {
    /// Count a set of lead records. Values outside the known sets get their own
    /// key; a missing or non-string value is counted as `unset`.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.total += 1;
            *stats.by_status.entry(bucket(record, "status")).or_default() += 1;
            *stats.by_source.entry(bucket(record, "source")).or_default() += 1;
        }
        stats
    }

    /// Count for a status value.
    pub fn status(&self, status: &str) -> u64 {
        self.by_status.get(status).copied().unwrap_or(0)
    }

    /// Count for a source value.
    pub fn source(&self, source: &str) -> u64 {
        self.by_source.get(source).copied().unwrap_or(0)
    }
}

fn seed(keys: &[&str]) -> BTreeMap<String, u64> {
    keys.iter().map(|key| ((*key).to_owned(), 0)).collect()
}

fn bucket(record: &Record, field: &str) -> String {
    match record.get(field) {
        Some(Value::String(value)) if !value.trim().is_empty() => value.trim().to_lowercase(),
        _ => UNSET.to_owned(),
    }
}
