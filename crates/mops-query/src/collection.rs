//! ---
//! mops_section: "07-query-pagination"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Query specification, backing-store boundary, and pagination engine."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use std::cmp::Ordering;

use indexmap::IndexMap;
use mops_common::config::CollectionConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Record;

/// Field that always breaks ordering ties.
pub const ID_FIELD: &str = "id";
/// Default ordering key.
pub const CREATED_AT_FIELD: &str = "created_at";

/// Ordering applied before paging. Always total: ties on `field` fall back to
/// ascending `id`, and records missing `field` sort after those that have it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    /// Primary ordering key.
    pub field: String,
    /// Newest/largest first when true.
    pub descending: bool,
}

impl SortOrder {
    /// Order by `field` ascending.
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Order by `field` descending.
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Compare two records under this order.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let primary = match (present(a, &self.field), present(b, &self.field)) {
            (Some(x), Some(y)) => {
                let ordering = compare_values(x, y);
                if self.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        primary.then_with(|| id_key(a).cmp(&id_key(b)))
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::descending(CREATED_AT_FIELD)
    }
}

fn present<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    record.get(field).filter(|value| !value.is_null())
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a)
            .cmp(&type_rank(b))
            .then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

/// Stable string form of a record id, used for tie-breaking.
pub fn id_key(record: &Record) -> String {
    match record.get(ID_FIELD) {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Per-collection query configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Backing-store collection name.
    pub name: String,
    /// Text fields the free-text search is matched against.
    pub search_fields: Vec<String>,
    /// Deterministic ordering.
    pub order: SortOrder,
    /// Field holding the owning site id, when the collection is site-scoped.
    pub site_field: Option<String>,
}

impl CollectionSchema {
    /// Schema ordered newest-first with the given search fields.
    pub fn new(name: impl Into<String>, search_fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            search_fields: search_fields.iter().map(|f| (*f).to_owned()).collect(),
            order: SortOrder::default(),
            site_field: None,
        }
    }

    /// Scope the collection by a site field.
    pub fn with_site_field(mut self, field: impl Into<String>) -> Self {
        self.site_field = Some(field.into());
        self
    }

    /// Replace the ordering.
    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    fn apply(&mut self, overrides: &CollectionConfig) {
        if let Some(fields) = &overrides.search_fields {
            self.search_fields = fields.clone();
        }
        if let Some(field) = &overrides.order_by {
            self.order.field = field.clone();
        }
        if let Some(descending) = overrides.descending {
            self.order.descending = descending;
        }
        if let Some(site_field) = &overrides.site_field {
            self.site_field = Some(site_field.clone());
        }
    }
}

/// Known collections keyed by name.
#[derive(Debug, Clone, Default)]
pub struct CollectionRegistry {
    schemas: IndexMap<String, CollectionSchema>,
}

impl CollectionRegistry {
    /// Empty registry; every lookup misses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dashboard collections with their default search fields.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(CollectionSchema::new("profiles", &["username", "email"]));
        registry.register(
            CollectionSchema::new("leads", &["name", "email", "phone", "company"])
                .with_site_field("site_id"),
        );
        registry.register(
            CollectionSchema::new("blogs", &["title", "description", "category"])
                .with_site_field("site_id"),
        );
        registry.register(
            CollectionSchema::new("seo_meta", &["page_url", "meta_title"])
                .with_site_field("site_id"),
        );
        registry.register(CollectionSchema::new("sites", &["name", "url"]));
        registry.register(CollectionSchema::new("ip_rules", &["ip_address", "note"]));
        registry.register(CollectionSchema::new(
            "activity_logs",
            &["action", "resource_type"],
        ));
        registry.register(CollectionSchema::new("notifications", &["title", "message"]));
        registry
    }

    /// Built-in collections with configuration overrides applied. Overrides for
    /// unknown names register new collections.
    pub fn with_overrides(mut self, overrides: &IndexMap<String, CollectionConfig>) -> Self {
        for (name, config) in overrides {
            let schema = self
                .schemas
                .entry(name.clone())
                .or_insert_with(|| CollectionSchema::new(name.clone(), &[]));
            schema.apply(config);
        }
        self
    }

    /// Insert or replace a schema.
    pub fn register(&mut self, schema: CollectionSchema) {
        self.schemas.insert(schema.name.clone(), schema);
    }

    /// Look up a schema.
    pub fn get(&self, name: &str) -> Option<&CollectionSchema> {
        self.schemas.get(name)
    }

    /// Registered collection names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn descending_order_breaks_ties_by_id() {
        let order = SortOrder::default();
        let a = record(json!({"id": "a", "created_at": "2024-01-01T00:00:00Z"}));
        let b = record(json!({"id": "b", "created_at": "2024-01-01T00:00:00Z"}));
        let newer = record(json!({"id": "c", "created_at": "2024-02-01T00:00:00Z"}));
        assert_eq!(order.compare(&newer, &a), Ordering::Less);
        assert_eq!(order.compare(&a, &b), Ordering::Less);
        assert_eq!(order.compare(&b, &a), Ordering::Greater);
    }

    #[test]
    fn missing_keys_sort_last_in_either_direction() {
        let with = record(json!({"id": "a", "score": 3}));
        let without = record(json!({"id": "b"}));
        assert_eq!(
            SortOrder::ascending("score").compare(&with, &without),
            Ordering::Less
        );
        assert_eq!(
            SortOrder::descending("score").compare(&with, &without),
            Ordering::Less
        );
    }

    #[test]
    fn numbers_compare_numerically() {
        let order = SortOrder::ascending("score");
        let two = record(json!({"id": "x", "score": 2}));
        let ten = record(json!({"id": "y", "score": 10}));
        assert_eq!(order.compare(&two, &ten), Ordering::Less);
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut overrides = IndexMap::new();
        overrides.insert(
            "profiles".to_owned(),
            CollectionConfig {
                search_fields: Some(vec!["username".into()]),
                order_by: Some("username".into()),
                descending: Some(false),
                site_field: None,
            },
        );
        overrides.insert("campaigns".to_owned(), CollectionConfig::default());
        let registry = CollectionRegistry::builtin().with_overrides(&overrides);
        let profiles = registry.get("profiles").unwrap();
        assert_eq!(profiles.search_fields, vec!["username".to_owned()]);
        assert_eq!(profiles.order, SortOrder::ascending("username"));
        assert!(registry.get("campaigns").is_some());
        assert!(registry.names().any(|name| name == "leads"));
    }
}
