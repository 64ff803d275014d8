//! ---
//! mops_section: "01-core-functionality"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Resource controllers and dashboard wiring."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use std::sync::Arc;

use mops_logging::{log_access_decision, mops_debug, mops_warn, AccessOutcome, LogContext};
use mops_notify::{Notification, Notifier, Severity, Target};
use mops_query::{PageResult, QueryEngine, QuerySpec, Record};
use mops_security::{
    AccessPolicy, Action, ActivityLog, ActivityRecord, IdentityError, IdentityProvider, Profile,
    Role, SecurityMetrics, Session,
};
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::bindings::{Recipient, ResourceBinding, PROFILES_COLLECTION};
use crate::ticket::RequestSequencer;
use crate::ControllerError;

type Result<T> = std::result::Result<T, ControllerError>;

/// Collection activity rows are mirrored into for listing.
pub const ACTIVITY_COLLECTION: &str = "activity_logs";

/// Result of a create, update or delete.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    /// The record as stored (or as it was before deletion).
    pub record: Record,
    /// Current page reloaded after the mutation, when one was requested and
    /// the reload was neither stale nor failed.
    pub page: Option<PageResult>,
}

/// Permission-gated list and mutation flow for one resource.
///
/// Every operation checks the session's role first; a denial is returned
/// before the store is touched. Notifications and activity entries are side
/// effects whose failures are logged and never fail the operation.
///
/// On the profiles collection, role and membership changes are also applied to
/// the attached [`IdentityProvider`], so sessions follow the stored profiles.
#[derive(Clone)]
pub struct ResourceController {
    binding: ResourceBinding,
    policy: Arc<AccessPolicy>,
    engine: QueryEngine,
    notifier: Notifier,
    activity: Option<Arc<Mutex<ActivityLog>>>,
    metrics: Option<SecurityMetrics>,
    identity: Option<IdentityProvider>,
    tickets: Arc<RequestSequencer>,
}

impl ResourceController {
    /// Controller for `binding` with no activity log, metrics or identity sync.
    pub fn new(
        binding: ResourceBinding,
        policy: Arc<AccessPolicy>,
        engine: QueryEngine,
        notifier: Notifier,
    ) -> Self {
        Self {
            binding,
            policy,
            engine,
            notifier,
            activity: None,
            metrics: None,
            identity: None,
            tickets: Arc::new(RequestSequencer::new()),
        }
    }

    /// Record mutations in `log`.
    pub fn with_activity_log(mut self, log: Arc<Mutex<ActivityLog>>) -> Self {
        self.activity = Some(log);
        self
    }

    /// Count access decisions.
    pub fn with_metrics(mut self, metrics: SecurityMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Keep `identity` in step with mutations of the profiles collection.
    pub fn with_identity(mut self, identity: IdentityProvider) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Resource this controller manages.
    pub fn binding(&self) -> &ResourceBinding {
        &self.binding
    }

    /// Check `action` on this resource for `session`.
    pub fn authorize(&self, session: &Session, action: Action) -> Result<()> {
        let allowed = self
            .policy
            .can_opt(session.role, self.binding.resource, action);
        let context = self.context(session);
        log_access_decision(
            Some(&context),
            &action.to_string(),
            AccessOutcome::from_verdict(allowed),
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_decision(allowed);
        }
        if allowed {
            Ok(())
        } else {
            Err(ControllerError::Unauthorized {
                role: session.role_name().to_owned(),
                resource: self.binding.resource.to_owned(),
                action,
            })
        }
    }

    /// One page of the resource, scoped to the session's site.
    pub async fn list(&self, session: &Session, spec: &QuerySpec) -> Result<PageResult> {
        self.authorize(session, Action::Read)?;
        let page = self
            .engine
            .paginate_for_site(self.binding.collection, spec, session.site_id.as_deref())
            .await?;
        Ok(page)
    }

    /// Like [`list`](Self::list), but the result is discarded (`Ok(None)`) when
    /// a newer list request was issued on this controller while it ran.
    pub async fn list_latest(
        &self,
        session: &Session,
        spec: &QuerySpec,
    ) -> Result<Option<PageResult>> {
        let ticket = self.tickets.issue();
        let result = self.list(session, spec).await;
        match self.tickets.accept(ticket, result) {
            Some(result) => result.map(Some),
            None => {
                mops_debug!(
                    context = self.context(session),
                    "discarding stale page {} response",
                    spec.page()
                );
                Ok(None)
            }
        }
    }

    /// Create a record. Site-scoped collections get the session's site stamped
    /// on the record unless it already names one.
    ///
    /// New profiles need a unique username and default to the `client` role.
    pub async fn create(
        &self,
        session: &Session,
        mut record: Record,
        reload: Option<&QuerySpec>,
    ) -> Result<MutationOutcome> {
        self.authorize(session, Action::Write)?;
        let role = match self.profiles() {
            Some(identity) => Some(prepare_profile(identity, &mut record)?),
            None => None,
        };
        if let (Some(field), Some(site_id)) = (self.site_field(), session.site_id.as_deref()) {
            record
                .entry(field)
                .or_insert_with(|| Value::String(site_id.to_owned()));
        }
        let created = self
            .engine
            .store()
            .insert(self.binding.collection, record)
            .await?;
        if let (Some(identity), Some(role)) = (self.profiles(), role) {
            identity.upsert_profile(profile_from_record(&created, role));
        }
        self.after_mutation(session, "create", &created, Severity::Success)
            .await;
        let page = self.reload(session, reload).await;
        Ok(MutationOutcome {
            record: created,
            page,
        })
    }

    /// Merge `patch` into the record `id`.
    ///
    /// A `role` in a profile patch must name a known role and is applied
    /// through [`IdentityProvider::set_role`].
    pub async fn update(
        &self,
        session: &Session,
        id: &str,
        mut patch: Record,
        reload: Option<&QuerySpec>,
    ) -> Result<MutationOutcome> {
        self.authorize(session, Action::Write)?;
        let role = match self.profiles() {
            Some(_) => requested_role(&mut patch)?,
            None => None,
        };
        let updated = self
            .engine
            .store()
            .update(self.binding.collection, id, patch)
            .await?;
        if let (Some(identity), Some(role)) = (self.profiles(), role) {
            match identity.set_role(session, &self.policy, id, role) {
                Ok(_) => {}
                Err(IdentityError::UserNotFound(_)) => {
                    identity.upsert_profile(profile_from_record(&updated, role));
                }
                Err(err) => return Err(err.into()),
            }
        }
        self.after_mutation(session, "update", &updated, self.binding.update_severity)
            .await;
        let page = self.reload(session, reload).await;
        Ok(MutationOutcome {
            record: updated,
            page,
        })
    }

    /// Remove the record `id`.
    pub async fn delete(
        &self,
        session: &Session,
        id: &str,
        reload: Option<&QuerySpec>,
    ) -> Result<MutationOutcome> {
        self.authorize(session, Action::Delete)?;
        let removed = self
            .engine
            .store()
            .delete(self.binding.collection, id)
            .await?;
        if let Some(identity) = self.profiles() {
            identity.remove_profile(id);
        }
        self.after_mutation(session, "delete", &removed, Severity::Warning)
            .await;
        let page = self.reload(session, reload).await;
        Ok(MutationOutcome {
            record: removed,
            page,
        })
    }

    fn profiles(&self) -> Option<&IdentityProvider> {
        if self.binding.collection == PROFILES_COLLECTION {
            self.identity.as_ref()
        } else {
            None
        }
    }

    fn site_field(&self) -> Option<&str> {
        self.engine
            .registry()
            .get(self.binding.collection)
            .and_then(|schema| schema.site_field.as_deref())
    }

    fn context<'a>(&'a self, session: &'a Session) -> LogContext<'a> {
        LogContext::new()
            .with_actor(&session.user_id)
            .with_role(session.role_name())
            .with_collection(self.binding.collection)
            .with_resource(self.binding.resource)
    }

    async fn after_mutation(
        &self,
        session: &Session,
        verb: &str,
        record: &Record,
        severity: Severity,
    ) {
        let id = record_id(record);
        let label = record
            .get(self.binding.label_field)
            .and_then(Value::as_str)
            .unwrap_or(&id)
            .to_owned();
        let action = self.binding.action_name(verb);

        let notification = Notification::new(
            Target::AllAdmins,
            format!("{} {}d", self.binding.display, verb),
            format!("{} \"{}\" was {}d", self.binding.display, label, verb),
            action.clone(),
        )
        .with_severity(severity)
        .with_resource(self.binding.kind, id.clone());
        if verb == "delete" {
            self.notifier.notify_admins(notification);
        } else {
            let user_id = match self.binding.recipient {
                Recipient::Actor => session.user_id.clone(),
                Recipient::Subject => id.clone(),
            };
            self.notifier.notify_user_and_admins(user_id, notification);
        }

        let entry = ActivityRecord::new(&session.user_id, &action, self.binding.kind, &id)
            .with_details(json!({
                "collection": self.binding.collection,
                "label": label,
                "role": session.role_name(),
            }));
        let row = json!({
            "user_id": entry.actor,
            "action": entry.action,
            "resource_type": entry.resource_type,
            "resource_id": entry.resource_id,
            "details": entry.details,
        });
        if let Value::Object(row) = row {
            if let Err(err) = self
                .engine
                .store()
                .insert(ACTIVITY_COLLECTION, row)
                .await
            {
                self.activity_failed(session, &action, &err);
            }
        }

        let Some(log) = &self.activity else {
            return;
        };
        let appended = log.lock().append(entry);
        if let Err(err) = appended {
            self.activity_failed(session, &action, &format!("{err:#}"));
        }
    }

    fn activity_failed(&self, session: &Session, action: &str, err: &dyn std::fmt::Display) {
        mops_warn!(
            context = self.context(session),
            "activity entry for {} could not be written: {}",
            action,
            err
        );
        if let Some(metrics) = &self.metrics {
            metrics.inc_activity_failure();
        }
    }

    async fn reload(&self, session: &Session, spec: Option<&QuerySpec>) -> Option<PageResult> {
        let spec = spec?;
        match self.list_latest(session, spec).await {
            Ok(page) => page,
            Err(err) => {
                mops_warn!(
                    context = self.context(session),
                    "page reload after mutation failed: {}",
                    err
                );
                None
            }
        }
    }
}

/// Validate and normalise the `role` field of a profile record, if present.
fn requested_role(record: &mut Record) -> Result<Option<Role>> {
    let role = match record.get("role") {
        None => return Ok(None),
        Some(Value::String(name)) => Role::parse(name)
            .ok_or_else(|| ControllerError::InvalidArgument(format!("unknown role '{name}'")))?,
        Some(other) => {
            return Err(ControllerError::InvalidArgument(format!(
                "role must be a role name, got {other}"
            )))
        }
    };
    record.insert("role".to_owned(), Value::String(role.as_str().to_owned()));
    Ok(Some(role))
}

/// Check a new profile record against the identity provider and fill in its role.
fn prepare_profile(identity: &IdentityProvider, record: &mut Record) -> Result<Role> {
    let username = record
        .get("username")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_owned();
    if username.is_empty() {
        return Err(IdentityError::EmptyUsername.into());
    }
    if identity.find_by_username(&username).is_some() {
        return Err(IdentityError::UsernameTaken(username).into());
    }
    let role = requested_role(record)?.unwrap_or(Role::Client);
    record.insert("username".to_owned(), Value::String(username));
    record.insert("role".to_owned(), Value::String(role.as_str().to_owned()));
    Ok(role)
}

fn profile_from_record(record: &Record, role: Role) -> Profile {
    let text = |field: &str| record.get(field).and_then(Value::as_str).map(str::to_owned);
    let mut profile = Profile::new(text("username").unwrap_or_default(), role);
    profile.id = record_id(record);
    profile.email = text("email");
    profile.phone = text("phone");
    profile
}

fn record_id(record: &Record) -> String {
    match record.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::binding;
    use async_trait::async_trait;
    use mops_notify::MemorySink;
    use mops_query::{
        CollectionRegistry, MemoryStore, RecordStore, StoreError, StoreQuery, StoreSlice,
    };
    use mops_security::Role;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingStore {
        inner: MemoryStore,
        calls: Arc<AtomicUsize>,
    }

    impl CountingStore {
        fn touch(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RecordStore for CountingStore {
        async fn fetch(&self, q: &StoreQuery) -> std::result::Result<StoreSlice, StoreError> {
            self.touch();
            tokio::task::yield_now().await;
            self.inner.fetch(q).await
        }
        async fn get(&self, c: &str, id: &str) -> std::result::Result<Option<Record>, StoreError> {
            self.touch();
            self.inner.get(c, id).await
        }
        async fn insert(&self, c: &str, r: Record) -> std::result::Result<Record, StoreError> {
            self.touch();
            self.inner.insert(c, r).await
        }
        async fn update(
            &self,
            c: &str,
            id: &str,
            p: Record,
        ) -> std::result::Result<Record, StoreError> {
            self.touch();
            self.inner.update(c, id, p).await
        }
        async fn delete(&self, c: &str, id: &str) -> std::result::Result<Record, StoreError> {
            self.touch();
            self.inner.delete(c, id).await
        }
    }

    struct Fixture {
        controller: ResourceController,
        store: MemoryStore,
        calls: Arc<AtomicUsize>,
        sink: Arc<MemorySink>,
        identity: IdentityProvider,
        _dir: tempfile::TempDir,
        log_path: std::path::PathBuf,
    }

    fn fixture(resource: &str) -> Fixture {
        let store = MemoryStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = QueryEngine::new(
            Arc::new(CountingStore {
                inner: store.clone(),
                calls: calls.clone(),
            }),
            CollectionRegistry::builtin(),
        );
        let sink = Arc::new(MemorySink::new());
        let notifier = Notifier::new(Duration::from_secs(1)).with_sink(sink.clone());
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("activity.log");
        let log = ActivityLog::new(&log_path).unwrap();
        let identity = IdentityProvider::new();
        let controller = ResourceController::new(
            *binding(resource).unwrap(),
            Arc::new(AccessPolicy::builtin()),
            engine,
            notifier,
        )
        .with_activity_log(Arc::new(Mutex::new(log)))
        .with_identity(identity.clone());
        Fixture {
            controller,
            store,
            calls,
            sink,
            identity,
            _dir: dir,
            log_path,
        }
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    fn profile_row(profile: &Profile) -> Record {
        match serde_json::to_value(profile).unwrap() {
            Value::Object(row) => row,
            other => panic!("profile serialised as {other}"),
        }
    }

    /// Registers alice (admin) and bob (client) in both the identity provider
    /// and the profiles collection.
    fn seed_users(fx: &Fixture) -> (Profile, Profile) {
        let alice = fx.identity.register("alice", None).unwrap();
        let bob = fx.identity.register("bob", None).unwrap();
        fx.store
            .seed(PROFILES_COLLECTION, vec![profile_row(&alice), profile_row(&bob)]);
        (alice, bob)
    }

    #[tokio::test]
    async fn unauthorized_mutations_never_reach_the_store() {
        let fx = fixture("users");
        let client = Session::new("u-client", Role::Client);
        let err = fx
            .controller
            .create(&client, record(json!({"username": "mallory"})), None)
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        let err = fx.controller.delete(&client, "u-1", None).await.unwrap_err();
        assert!(err.is_unauthorized());
        let err = fx
            .controller
            .list(&client, &QuerySpec::new(1, 10))
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_roles_are_denied() {
        let fx = fixture("leads");
        let session = Session::from_claims("u-x", "intern");
        let err = fx
            .controller
            .list(&session, &QuerySpec::new(1, 10))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "role unknown may not read leads");
    }

    #[tokio::test]
    async fn create_notifies_audits_and_reloads() {
        let fx = fixture("blogs");
        let editor = Session::new("u-seo", Role::SeoPerson);
        let outcome = fx
            .controller
            .create(
                &editor,
                record(json!({"title": "Launch notes", "category": "news"})),
                Some(&QuerySpec::new(1, 10)),
            )
            .await
            .unwrap();
        let page = outcome.page.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.records[0]["title"], json!("Launch notes"));

        settle().await;
        let delivered = fx.sink.delivered();
        assert_eq!(delivered.len(), 2);
        assert!(delivered.iter().all(|n| n.action_type == "create_blog"));
        assert!(delivered.iter().all(|n| n.severity == Severity::Success));

        let log = ActivityLog::new(&fx.log_path).unwrap();
        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "create_blog");
        assert_eq!(entries[0].actor, "u-seo");
        assert!(log.verify().unwrap());
    }

    #[tokio::test]
    async fn delete_warns_admins_only() {
        let fx = fixture("blogs");
        fx.store.seed(
            "blogs",
            vec![record(json!({"id": "b-1", "title": "Old", "created_at": "2024-01-01T00:00:00Z"}))],
        );
        let manager = Session::new("u-mgr", Role::SeoManager);
        let outcome = fx.controller.delete(&manager, "b-1", None).await.unwrap();
        assert_eq!(outcome.record["title"], json!("Old"));
        assert!(outcome.page.is_none());

        settle().await;
        let delivered = fx.sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].target, Target::AllAdmins);
        assert_eq!(delivered[0].severity, Severity::Warning);
        assert_eq!(delivered[0].message, "Blog \"Old\" was deleted");
    }

    #[tokio::test]
    async fn role_updates_and_deletions_reach_sessions() {
        let fx = fixture("users");
        let (alice, bob) = seed_users(&fx);
        let admin = alice.session();

        let outcome = fx
            .controller
            .update(&admin, &bob.id, record(json!({"role": " Admin "})), None)
            .await
            .unwrap();
        assert_eq!(outcome.record["role"], json!("admin"));
        assert_eq!(
            fx.identity.session_for(&bob.id, None).unwrap().role,
            Some(Role::Admin)
        );
        assert_eq!(fx.identity.admin_ids(), vec![alice.id.clone(), bob.id.clone()]);

        let calls = fx.calls.load(Ordering::SeqCst);
        let err = fx
            .controller
            .update(&admin, &bob.id, record(json!({"role": "root"})), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidArgument(_)));
        let err = fx
            .controller
            .update(&admin, &bob.id, record(json!({"role": 7})), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidArgument(_)));
        assert_eq!(fx.calls.load(Ordering::SeqCst), calls);
        assert_eq!(
            fx.identity.get_profile(&bob.id).unwrap().role,
            Role::Admin
        );

        fx.controller.delete(&admin, &bob.id, None).await.unwrap();
        assert!(fx.identity.session_for(&bob.id, None).is_err());
        assert_eq!(fx.identity.admin_ids(), vec![alice.id]);
    }

    #[tokio::test]
    async fn created_users_join_the_identity_provider() {
        let fx = fixture("users");
        let (alice, _) = seed_users(&fx);
        let admin = alice.session();

        let created = fx
            .controller
            .create(
                &admin,
                record(json!({"username": "carol", "role": "sales_person"})),
                None,
            )
            .await
            .unwrap()
            .record;
        let carol = fx.identity.find_by_username("carol").unwrap();
        assert_eq!(carol.role, Role::SalesPerson);
        assert_eq!(json!(carol.id), created["id"]);

        let default_role = fx
            .controller
            .create(&admin, record(json!({"username": "dave"})), None)
            .await
            .unwrap()
            .record;
        assert_eq!(default_role["role"], json!("client"));

        let err = fx
            .controller
            .create(&admin, record(json!({"username": "carol"})), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Identity(IdentityError::UsernameTaken(_))
        ));
        assert_eq!(fx.store.count(PROFILES_COLLECTION), 4);
    }

    #[tokio::test]
    async fn user_notifications_go_to_the_affected_user() {
        let fx = fixture("users");
        let (alice, bob) = seed_users(&fx);
        fx.controller
            .update(
                &alice.session(),
                &bob.id,
                record(json!({"email": "bob@example.com"})),
                None,
            )
            .await
            .unwrap();

        settle().await;
        let delivered = fx.sink.delivered();
        assert_eq!(delivered.len(), 2);
        assert!(delivered
            .iter()
            .any(|n| n.target == Target::User(bob.id.clone())));
        assert!(delivered
            .iter()
            .all(|n| n.target != Target::User(alice.id.clone())));
        assert!(delivered.iter().all(|n| n.severity == Severity::Info));
    }

    #[tokio::test]
    async fn content_updates_notify_the_editor_with_success() {
        let fx = fixture("blogs");
        fx.store.seed(
            "blogs",
            vec![record(json!({"id": "b-1", "title": "Draft", "created_at": "2024-01-01T00:00:00Z"}))],
        );
        let editor = Session::new("u-seo", Role::SeoPerson);
        fx.controller
            .update(&editor, "b-1", record(json!({"title": "Final"})), None)
            .await
            .unwrap();

        settle().await;
        let delivered = fx.sink.delivered();
        assert!(delivered
            .iter()
            .any(|n| n.target == Target::User("u-seo".into())));
        assert!(delivered.iter().all(|n| n.severity == Severity::Success));
        assert!(delivered.iter().all(|n| n.action_type == "update_blog"));
    }

    #[tokio::test]
    async fn missing_records_report_not_found() {
        let fx = fixture("leads");
        let admin = Session::new("u-admin", Role::Admin);
        let err = fx
            .controller
            .update(&admin, "nope", record(json!({"status": "completed"})), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn site_sessions_stamp_and_scope_records() {
        let fx = fixture("leads");
        let sales = Session::new("u-sales", Role::SalesPerson).with_site("site-1");
        fx.controller
            .create(&sales, record(json!({"name": "Acme"})), None)
            .await
            .unwrap();
        fx.store.seed(
            "leads",
            vec![record(json!({"id": "other", "name": "Elsewhere", "site_id": "site-2", "created_at": "2024-01-01T00:00:00Z"}))],
        );
        let page = fx.controller.list(&sales, &QuerySpec::new(1, 10)).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.records[0]["site_id"], json!("site-1"));
    }

    #[tokio::test]
    async fn activity_failures_do_not_fail_the_mutation() {
        let fx = fixture("leads");
        std::fs::remove_file(&fx.log_path).ok();
        std::fs::create_dir_all(&fx.log_path).unwrap();
        let admin = Session::new("u-admin", Role::Admin);
        let outcome = fx
            .controller
            .create(&admin, record(json!({"name": "Acme"})), None)
            .await;
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn stale_list_responses_are_dropped() {
        let fx = fixture("leads");
        let admin = Session::new("u-admin", Role::Admin);
        let spec = QuerySpec::new(1, 10);
        let first = fx.controller.list_latest(&admin, &spec);
        let second = fx.controller.list_latest(&admin, &spec);
        // fetch yields once, so both tickets are issued before either response is checked
        let (first, second) = tokio::join!(first, second);
        let accepted = [first.unwrap(), second.unwrap()]
            .into_iter()
            .filter(Option::is_some)
            .count();
        assert_eq!(accepted, 1);
    }
}
