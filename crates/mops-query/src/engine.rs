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
use std::sync::Arc;

use mops_common::config::{AppConfig, PaginationConfig};
use serde_json::Value;
use tracing::{debug, warn};

use crate::collection::{CollectionRegistry, CollectionSchema};
use crate::metrics::QueryMetrics;
use crate::spec::{PageResult, QuerySpec};
use crate::store::{RecordStore, StoreQuery};
use crate::{QueryError, Record, Result};

/// Reusable pagination over any [`RecordStore`].
///
/// Every call owns its spec and its result; the engine keeps no cursor, so
/// concurrent calls never observe each other.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn RecordStore>,
    registry: Arc<CollectionRegistry>,
    max_page_size: u32,
    metrics: Option<QueryMetrics>,
}

impl QueryEngine {
    /// Engine over `store` with the default page size ceiling.
    pub fn new(store: Arc<dyn RecordStore>, registry: CollectionRegistry) -> Self {
        Self {
            store,
            registry: Arc::new(registry),
            max_page_size: PaginationConfig::default().max_page_size,
            metrics: None,
        }
    }

    /// Engine configured from the `pagination` and `collections` sections.
    pub fn from_config(store: Arc<dyn RecordStore>, config: &AppConfig) -> Self {
        let registry = CollectionRegistry::builtin().with_overrides(&config.collections);
        Self::new(store, registry).with_max_page_size(config.pagination.max_page_size)
    }

    /// Override the largest accepted page size.
    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    /// Attach Prometheus counters.
    pub fn with_metrics(mut self, metrics: QueryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Largest accepted page size.
    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    /// Known collections.
    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    /// Backing store handle, shared with mutation paths.
    pub fn store(&self) -> Arc<dyn RecordStore> {
        Arc::clone(&self.store)
    }

    /// One page of `collection` under `spec`.
    pub async fn paginate(&self, collection: &str, spec: &QuerySpec) -> Result<PageResult> {
        self.paginate_for_site(collection, spec, None).await
    }

    /// One page of `collection`, restricted to `site_id` when the collection is
    /// site-scoped. A caller filter on the site field that names a different
    /// site yields an empty page.
    pub async fn paginate_for_site(
        &self,
        collection: &str,
        spec: &QuerySpec,
        site_id: Option<&str>,
    ) -> Result<PageResult> {
        let result = self.run(collection, spec, site_id).await;
        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(_) => metrics.record_page(collection),
                Err(QueryError::InvalidArgument(_)) => {
                    metrics.record_failure(collection, "invalid_argument")
                }
                Err(QueryError::StoreUnavailable(_)) => {
                    metrics.record_failure(collection, "store_unavailable")
                }
            }
        }
        result
    }

    async fn run(
        &self,
        collection: &str,
        spec: &QuerySpec,
        site_id: Option<&str>,
    ) -> Result<PageResult> {
        spec.validate(self.max_page_size)?;
        let schema = self.schema(collection)?;

        let mut filters = spec.filters().clone();
        if let (Some(field), Some(site_id)) = (&schema.site_field, site_id) {
            let scoped = Value::String(site_id.to_owned());
            match filters.get(field) {
                Some(existing) if existing != &scoped => {
                    debug!(collection, site_id, "site filter conflicts with caller filter");
                    return Ok(PageResult::empty(spec.page(), spec.page_size()));
                }
                _ => {
                    filters.insert(field.clone(), scoped);
                }
            }
        }

        let query = StoreQuery {
            collection: schema.name.clone(),
            filters,
            search: spec.normalized_search(),
            search_fields: schema.search_fields.clone(),
            order: schema.order.clone(),
            offset: spec.offset(),
            limit: Some(spec.page_size()),
        };
        let slice = self.store.fetch(&query).await.map_err(|err| {
            warn!(collection, store = self.store.name(), error = %err, "page query failed");
            QueryError::from(err)
        })?;

        let mut records = slice.records;
        records.truncate(spec.page_size() as usize);
        let page = PageResult::new(records, slice.total, spec.page(), spec.page_size());
        debug!(
            collection,
            page = page.page,
            page_size = page.page_size,
            returned = page.len(),
            total = page.total,
            "page served"
        );
        Ok(page)
    }

    /// Every record of `collection` matching `filters`, in collection order.
    pub async fn fetch_all(
        &self,
        collection: &str,
        filters: &BTreeMap<String, Value>,
    ) -> Result<Vec<Record>> {
        let schema = self.schema(collection)?;
        let mut query = StoreQuery::all(schema.name.clone());
        query.filters = filters.clone();
        query.order = schema.order.clone();
        Ok(self.store.fetch(&query).await?.records)
    }

    fn schema(&self, collection: &str) -> Result<&CollectionSchema> {
        self.registry
            .get(collection)
            .ok_or_else(|| QueryError::InvalidArgument(format!("unknown collection: {collection}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreSlice};
    use crate::StoreError;
    use async_trait::async_trait;
    use prometheus::Registry;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn profile(n: usize, role: &str, username: &str) -> Record {
        json!({
            "id": format!("p-{n:03}"),
            "username": username,
            "role": role,
            "created_at": format!("2024-01-01T00:{:02}:{:02}Z", n / 60, n % 60),
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn profiles(count: usize) -> MemoryStore {
        let store = MemoryStore::new();
        store.seed(
            "profiles",
            (0..count).map(|n| profile(n, "client", &format!("user{n}"))),
        );
        store
    }

    fn engine(store: impl RecordStore + 'static) -> QueryEngine {
        QueryEngine::new(Arc::new(store), CollectionRegistry::builtin())
    }

    struct CountingStore {
        inner: MemoryStore,
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RecordStore for CountingStore {
        async fn fetch(&self, query: &StoreQuery) -> std::result::Result<StoreSlice, StoreError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(query).await
        }
        async fn get(&self, c: &str, id: &str) -> std::result::Result<Option<Record>, StoreError> {
            self.inner.get(c, id).await
        }
        async fn insert(&self, c: &str, r: Record) -> std::result::Result<Record, StoreError> {
            self.inner.insert(c, r).await
        }
        async fn update(
            &self,
            c: &str,
            id: &str,
            p: Record,
        ) -> std::result::Result<Record, StoreError> {
            self.inner.update(c, id, p).await
        }
        async fn delete(&self, c: &str, id: &str) -> std::result::Result<Record, StoreError> {
            self.inner.delete(c, id).await
        }
    }

    #[tokio::test]
    async fn filter_on_absent_field_yields_empty_page() {
        let engine = engine(profiles(5));
        let page = engine
            .paginate("profiles", &QuerySpec::new(1, 10).with_filter("company", "x"))
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert!(page.is_empty());
        assert_eq!(page.total_pages(), 0);
    }

    struct DownStore;

    #[async_trait]
    impl RecordStore for DownStore {
        async fn fetch(&self, _: &StoreQuery) -> std::result::Result<StoreSlice, StoreError> {
            Err(StoreError::Unreachable("connection refused".into()))
        }
        async fn get(&self, _: &str, _: &str) -> std::result::Result<Option<Record>, StoreError> {
            Err(StoreError::Unreachable("connection refused".into()))
        }
        async fn insert(&self, _: &str, _: Record) -> std::result::Result<Record, StoreError> {
            Err(StoreError::Unreachable("connection refused".into()))
        }
        async fn update(
            &self,
            _: &str,
            _: &str,
            _: Record,
        ) -> std::result::Result<Record, StoreError> {
            Err(StoreError::Unreachable("connection refused".into()))
        }
        async fn delete(&self, _: &str, _: &str) -> std::result::Result<Record, StoreError> {
            Err(StoreError::Unreachable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn forty_five_records_in_pages_of_twenty() {
        let engine = engine(profiles(45));
        let first = engine.paginate("profiles", &QuerySpec::new(1, 20)).await.unwrap();
        assert_eq!((first.len(), first.total), (20, 45));
        assert_eq!(first.total_pages(), 3);

        let third = engine.paginate("profiles", &QuerySpec::new(3, 20)).await.unwrap();
        assert_eq!((third.len(), third.total), (5, 45));

        let fourth = engine.paginate("profiles", &QuerySpec::new(4, 20)).await.unwrap();
        assert_eq!((fourth.len(), fourth.total), (0, 45));
        assert!(fourth.is_past_end());
    }

    #[tokio::test]
    async fn pages_cover_the_set_exactly_once() {
        let engine = engine(profiles(23));
        let spec = QuerySpec::new(1, 4);
        let mut seen = Vec::new();
        let mut page = engine.paginate("profiles", &spec).await.unwrap();
        let pages = page.total_pages();
        for n in 1..=pages {
            if n > 1 {
                page = engine
                    .paginate("profiles", &spec.at_page(n as u32))
                    .await
                    .unwrap();
            }
            seen.extend(page.records.iter().map(|r| r["id"].clone()));
        }
        assert_eq!(seen.len(), 23);
        let unique: HashSet<String> = seen.iter().map(Value::to_string).collect();
        assert_eq!(unique.len(), 23);
        // newest first
        assert_eq!(seen[0], json!("p-022"));
    }

    #[tokio::test]
    async fn filter_and_search_compose() {
        let store = MemoryStore::new();
        store.seed(
            "profiles",
            vec![
                profile(1, "client", "john"),
                profile(2, "admin", "johnny"),
                profile(3, "client", "mary"),
                profile(4, "client", "Big John"),
            ],
        );
        let engine = engine(store);
        let spec = QuerySpec::new(1, 10)
            .with_filter("role", "client")
            .with_search("john");
        let page = engine.paginate("profiles", &spec).await.unwrap();
        assert_eq!(page.total, 2);
        let names: Vec<_> = page.records.iter().map(|r| r["username"].clone()).collect();
        assert_eq!(names, vec![json!("Big John"), json!("john")]);
    }

    #[tokio::test]
    async fn blank_search_is_no_search() {
        let engine = engine(profiles(7));
        let plain = engine.paginate("profiles", &QuerySpec::new(1, 5)).await.unwrap();
        let blank = engine
            .paginate("profiles", &QuerySpec::new(1, 5).with_search("   "))
            .await
            .unwrap();
        let empty = engine
            .paginate("profiles", &QuerySpec::new(1, 5).with_search(""))
            .await
            .unwrap();
        assert_eq!(plain, blank);
        assert_eq!(plain, empty);
    }

    #[tokio::test]
    async fn invalid_specs_never_reach_the_store() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let engine = engine(CountingStore {
            inner: profiles(3),
            fetches: fetches.clone(),
        })
        .with_max_page_size(50);

        for spec in [QuerySpec::new(0, 10), QuerySpec::new(1, 0), QuerySpec::new(1, 51)] {
            let err = engine.paginate("profiles", &spec).await.unwrap_err();
            assert!(matches!(err, QueryError::InvalidArgument(_)));
        }
        let err = engine
            .paginate("invoices", &QuerySpec::new(1, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));
        assert_eq!(fetches.load(Ordering::SeqCst), 0);

        engine.paginate("profiles", &QuerySpec::new(1, 50)).await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn store_failures_surface_as_unavailable() {
        let metrics = QueryMetrics::new(Arc::new(Registry::new())).unwrap();
        let engine = engine(DownStore).with_metrics(metrics.clone());
        let err = engine
            .paginate("leads", &QuerySpec::new(1, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::StoreUnavailable(_)));
        assert_eq!(metrics.failures("leads", "store_unavailable"), 1);
        assert_eq!(metrics.pages_served("leads"), 0);
    }

    #[tokio::test]
    async fn site_scope_adds_a_filter() {
        let store = MemoryStore::from_json_str(
            r#"{"leads": [
                {"id": "a", "name": "Acme", "site_id": "s1", "created_at": "2024-01-01T00:00:00Z"},
                {"id": "b", "name": "Beta", "site_id": "s2", "created_at": "2024-01-02T00:00:00Z"},
                {"id": "c", "name": "Core", "site_id": "s1", "created_at": "2024-01-03T00:00:00Z"}
            ]}"#,
        )
        .unwrap();
        let engine = engine(store);
        let spec = QuerySpec::new(1, 10);

        let scoped = engine
            .paginate_for_site("leads", &spec, Some("s1"))
            .await
            .unwrap();
        assert_eq!(scoped.total, 2);

        let conflicting = engine
            .paginate_for_site("leads", &spec.clone().with_filter("site_id", "s2"), Some("s1"))
            .await
            .unwrap();
        assert_eq!(conflicting.total, 0);
        assert!(conflicting.is_empty());

        let unscoped = engine.paginate("leads", &spec).await.unwrap();
        assert_eq!(unscoped.total, 3);
    }

    #[tokio::test]
    async fn concurrent_pages_are_independent() {
        let engine = engine(profiles(30));
        let (spec_a, spec_b) = (QuerySpec::new(1, 10), QuerySpec::new(2, 10));
        let (a, b) = futures::join!(
            engine.paginate("profiles", &spec_a),
            engine.paginate("profiles", &spec_b),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.page, 1);
        assert_eq!(b.page, 2);
        assert_ne!(a.records[0]["id"], b.records[0]["id"]);
    }

    #[tokio::test]
    async fn fetch_all_returns_every_match() {
        let engine = engine(profiles(130));
        let mut filters = BTreeMap::new();
        filters.insert("role".to_owned(), json!("client"));
        let all = engine.fetch_all("profiles", &filters).await.unwrap();
        assert_eq!(all.len(), 130);
    }

    #[test]
    fn from_config_applies_limits() {
        let mut config = AppConfig::default();
        config.pagination.max_page_size = 25;
        let engine = QueryEngine::from_config(Arc::new(MemoryStore::new()), &config);
        assert_eq!(engine.max_page_size(), 25);
        assert!(engine.registry().get("leads").is_some());
    }
}
