//! ---
//! mops_section: "07-query-pagination"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Query specification, backing-store boundary, and pagination engine."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use parking_lot::RwLock;
use serde_json::Value;

use crate::collection::{SortOrder, CREATED_AT_FIELD, ID_FIELD};
use crate::{Record, StoreError};

/// Field refreshed on every update.
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// Fully resolved request handed to a [`RecordStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    /// Collection to read.
    pub collection: String,
    /// Conjunctive exact-match filters.
    pub filters: BTreeMap<String, Value>,
    /// Normalized (trimmed, lower-cased, non-empty) search term.
    pub search: Option<String>,
    /// Fields the search term is matched against.
    pub search_fields: Vec<String>,
    /// Total ordering to apply before slicing.
    pub order: SortOrder,
    /// Number of matching records to skip.
    pub offset: u64,
    /// Maximum number of records to return; `None` returns all of them.
    pub limit: Option<u32>,
}

impl StoreQuery {
    /// Unfiltered, unpaged query over `collection`.
    pub fn all(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: BTreeMap::new(),
            search: None,
            search_fields: Vec::new(),
            order: SortOrder::default(),
            offset: 0,
            limit: None,
        }
    }

    /// Whether `record` passes both the filters and the search term.
    pub fn matches(&self, record: &Record) -> bool {
        matches_filters(record, &self.filters)
            && self
                .search
                .as_deref()
                .map_or(true, |term| matches_search(record, term, &self.search_fields))
    }
}

/// One slice of a collection plus the size of the whole filtered set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSlice {
    /// Records in query order.
    pub records: Vec<Record>,
    /// Count of every record matching the query, ignoring offset and limit.
    pub total: u64,
}

/// Boundary to whatever holds the dashboard's records.
///
/// Implementations must apply filters, search and ordering before slicing, and
/// must report `total` for the filtered set.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "store"
    }

    /// Read a slice of a collection.
    async fn fetch(&self, query: &StoreQuery) -> Result<StoreSlice, StoreError>;

    /// Read one record by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError>;

    /// Insert a record, returning it as stored.
    async fn insert(&self, collection: &str, record: Record) -> Result<Record, StoreError>;

    /// Merge `patch` into an existing record, returning the updated record.
    async fn update(&self, collection: &str, id: &str, patch: Record)
        -> Result<Record, StoreError>;

    /// Remove a record, returning what was removed.
    async fn delete(&self, collection: &str, id: &str) -> Result<Record, StoreError>;
}

/// Whether every filter field is present on `record` with exactly that value.
pub fn matches_filters(record: &Record, filters: &BTreeMap<String, Value>) -> bool {
    filters
        .iter()
        .all(|(field, expected)| record.get(field) == Some(expected))
}

/// Whether any string field in `fields` contains `term`, ignoring case.
/// `term` must already be lower-cased.
pub fn matches_search(record: &Record, term: &str, fields: &[String]) -> bool {
    fields.iter().any(|field| match record.get(field) {
        Some(Value::String(text)) => text.to_lowercase().contains(term),
        _ => false,
    })
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// In-process store keyed by collection name.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<Record>>>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `{ "collection": [records...] }` document.
    pub fn from_json_str(raw: &str) -> Result<Self, StoreError> {
        let collections: HashMap<String, Vec<Record>> = serde_json::from_str(raw)?;
        Ok(Self {
            collections: Arc::new(RwLock::new(collections)),
        })
    }

    /// Load a seed document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Append records to a collection verbatim.
    pub fn seed(&self, collection: &str, records: impl IntoIterator<Item = Record>) {
        self.collections
            .write()
            .entry(collection.to_owned())
            .or_default()
            .extend(records);
    }

    /// Every record of a collection in insertion order.
    pub fn snapshot(&self, collection: &str) -> Vec<Record> {
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of records held for `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, Vec::len)
    }

    fn not_found(collection: &str, id: &str) -> StoreError {
        StoreError::NotFound {
            collection: collection.to_owned(),
            id: id.to_owned(),
        }
    }
}

fn has_id(record: &Record, id: &str) -> bool {
    matches!(record.get(ID_FIELD), Some(Value::String(value)) if value == id)
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, query: &StoreQuery) -> Result<StoreSlice, StoreError> {
        let mut matched: Vec<Record> = {
            let collections = self.collections.read();
            collections
                .get(&query.collection)
                .map(|records| {
                    records
                        .iter()
                        .filter(|record| query.matches(record))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };
        matched.sort_by(|a, b| query.order.compare(a, b));

        let total = matched.len() as u64;
        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let records = matched
            .into_iter()
            .skip(offset)
            .take(query.limit.map_or(usize::MAX, |limit| limit as usize))
            .collect();
        Ok(StoreSlice { records, total })
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|records| records.iter().find(|record| has_id(record, id)).cloned()))
    }

    async fn insert(&self, collection: &str, mut record: Record) -> Result<Record, StoreError> {
        let now = timestamp();
        let id = match record.get(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::String(_)) | Some(Value::Null) | None => uuid::Uuid::new_v4().to_string(),
            Some(other) => {
                return Err(StoreError::Rejected(format!(
                    "record id must be a string, got {other}"
                )))
            }
        };
        record.insert(ID_FIELD.to_owned(), Value::String(id.clone()));
        record
            .entry(CREATED_AT_FIELD)
            .or_insert_with(|| Value::String(now.clone()));
        record.insert(UPDATED_AT_FIELD.to_owned(), Value::String(now));

        let mut collections = self.collections.write();
        let records = collections.entry(collection.to_owned()).or_default();
        if records.iter().any(|existing| has_id(existing, &id)) {
            return Err(StoreError::Rejected(format!(
                "duplicate id {id} in {collection}"
            )));
        }
        records.push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Record,
    ) -> Result<Record, StoreError> {
        let mut collections = self.collections.write();
        let record = collections
            .get_mut(collection)
            .and_then(|records| records.iter_mut().find(|record| has_id(record, id)))
            .ok_or_else(|| Self::not_found(collection, id))?;
        for (field, value) in patch {
            if field == ID_FIELD || field == CREATED_AT_FIELD {
                continue;
            }
            record.insert(field, value);
        }
        record.insert(UPDATED_AT_FIELD.to_owned(), Value::String(timestamp()));
        Ok(record.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<Record, StoreError> {
        let mut collections = self.collections.write();
        let records = collections
            .get_mut(collection)
            .ok_or_else(|| Self::not_found(collection, id))?;
        let position = records
            .iter()
            .position(|record| has_id(record, id))
            .ok_or_else(|| Self::not_found(collection, id))?;
        Ok(records.remove(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn seeded() -> MemoryStore {
        MemoryStore::from_json_str(
            r#"{
                "profiles": [
                    {"id": "1", "username": "john", "role": "client", "created_at": "2024-01-01T00:00:00Z"},
                    {"id": "2", "username": "Johnny", "role": "admin", "created_at": "2024-01-02T00:00:00Z"},
                    {"id": "3", "username": "mary", "email": "JOHN@example.com", "role": "client", "created_at": "2024-01-03T00:00:00Z"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn fetch_filters_searches_and_orders() {
        let store = seeded();
        let mut query = StoreQuery::all("profiles");
        query.filters.insert("role".into(), json!("client"));
        query.search = Some("john".into());
        query.search_fields = vec!["username".into(), "email".into()];

        let slice = store.fetch(&query).await.unwrap();
        assert_eq!(slice.total, 2);
        let ids: Vec<_> = slice.records.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("3"), json!("1")]);
    }

    #[tokio::test]
    async fn filters_on_absent_fields_match_nothing() {
        let store = seeded();
        let mut query = StoreQuery::all("profiles");
        query.filters.insert("company".into(), json!("x"));
        let slice = store.fetch(&query).await.unwrap();
        assert_eq!(slice.total, 0);
        assert!(slice.records.is_empty());

        // a null filter does not stand in for a missing field
        let mut query = StoreQuery::all("profiles");
        query.filters.insert("email".into(), Value::Null);
        assert_eq!(store.fetch(&query).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn fetch_slices_after_counting() {
        let store = seeded();
        let mut query = StoreQuery::all("profiles");
        query.offset = 2;
        query.limit = Some(2);
        let slice = store.fetch(&query).await.unwrap();
        assert_eq!(slice.total, 3);
        assert_eq!(slice.records.len(), 1);

        query.offset = 10;
        let slice = store.fetch(&query).await.unwrap();
        assert_eq!(slice.total, 3);
        assert!(slice.records.is_empty());
    }

    #[tokio::test]
    async fn unknown_collection_is_empty() {
        let slice = MemoryStore::new()
            .fetch(&StoreQuery::all("leads"))
            .await
            .unwrap();
        assert_eq!(slice, StoreSlice::default());
    }

    #[tokio::test]
    async fn insert_update_delete_cycle() {
        let store = MemoryStore::new();
        let created = store
            .insert("blogs", record(json!({"title": "Launch"})))
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap().to_owned();
        assert!(created.contains_key("created_at"));

        let updated = store
            .update("blogs", &id, record(json!({"title": "Relaunch", "id": "other"})))
            .await
            .unwrap();
        assert_eq!(updated["title"], json!("Relaunch"));
        assert_eq!(updated["id"], json!(id));
        assert_eq!(updated["created_at"], created["created_at"]);

        let removed = store.delete("blogs", &id).await.unwrap();
        assert_eq!(removed["title"], json!("Relaunch"));
        assert!(store.get("blogs", &id).await.unwrap().is_none());
        assert!(matches!(
            store.delete("blogs", &id).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_ids_rejected() {
        let store = seeded();
        let err = store
            .insert("profiles", record(json!({"id": "1", "username": "again"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
    }

    #[test]
    fn search_ignores_non_string_fields() {
        let row = record(json!({"id": "1", "name": 42, "email": "a@b.c"}));
        assert!(!matches_search(&row, "42", &["name".into()]));
        assert!(matches_search(&row, "b.c", &["name".into(), "email".into()]));
        assert!(!matches_search(&row, "b.c", &[]));
    }
}
