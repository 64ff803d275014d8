//! ---
//! mops_section: "01-core-functionality"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Resource controllers and dashboard wiring."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use mops_common::config::AppConfig;
use mops_notify::{LogSink, Notifier, NotifyMetrics};
use mops_query::{LeadStats, QueryEngine, QueryMetrics, Record, RecordStore};
use mops_security::{
    visible_menu, AccessPolicy, Action, ActivityLog, IdentityProvider, MenuEntry, Profile,
    SecurityMetrics, Session, DEFAULT_MENU,
};
use parking_lot::Mutex;
use prometheus::Registry;
use serde_json::Value;
use tracing::{info, warn};

use crate::bindings::{binding, PROFILES_COLLECTION};
use crate::controller::ResourceController;
use crate::sink::CollectionSink;
use crate::ControllerError;

/// Everything a dashboard session talks to, built once at start-up and shared.
#[derive(Clone)]
pub struct DashboardCore {
    policy: Arc<AccessPolicy>,
    identity: IdentityProvider,
    engine: QueryEngine,
    notifier: Notifier,
    activity: Option<Arc<Mutex<ActivityLog>>>,
    metrics: SecurityMetrics,
    registry: Arc<Registry>,
}

impl DashboardCore {
    /// Build the policy, engine, notifier and activity log described by
    /// `config` on top of `store`.
    pub fn from_config(config: &AppConfig, store: Arc<dyn RecordStore>) -> Result<Self> {
        let policy = match &config.policy.rules_path {
            Some(path) => AccessPolicy::load(path)
                .with_context(|| format!("failed to load policy from {}", path.display()))?,
            None => AccessPolicy::builtin(),
        };

        let registry = Arc::new(Registry::new());
        let metrics = SecurityMetrics::new(registry.clone())?;
        let engine = QueryEngine::from_config(store.clone(), config)
            .with_metrics(QueryMetrics::new(registry.clone())?);

        let identity = IdentityProvider::new();
        let notifier = Notifier::from_config(&config.notifications)
            .with_sink(Arc::new(LogSink))
            .with_sink(Arc::new(CollectionSink::new(store, identity.clone())))
            .with_metrics(NotifyMetrics::new(registry.clone())?);

        let activity = if config.audit.enabled {
            let log = ActivityLog::new(&config.audit.path).with_context(|| {
                format!("failed to open activity log {}", config.audit.path.display())
            })?;
            Some(Arc::new(Mutex::new(log)))
        } else {
            None
        };

        info!(
            rules = policy.len(),
            max_page_size = engine.max_page_size(),
            notifications = notifier.is_enabled(),
            audit = activity.is_some(),
            "dashboard core ready"
        );

        Ok(Self {
            policy: Arc::new(policy),
            identity,
            engine,
            notifier,
            activity,
            metrics,
            registry,
        })
    }

    /// Replace the notifier, keeping everything else.
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Permission table in force.
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Profile directory sessions are issued from.
    pub fn identity(&self) -> &IdentityProvider {
        &self.identity
    }

    /// Shared pagination engine.
    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    /// Notification fan-out used by every controller.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Shared Prometheus registry holding every counter of the core.
    pub fn metrics_registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Controller for a resource, or `None` when the resource has no collection.
    pub fn controller(&self, resource: &str) -> Option<ResourceController> {
        let binding = binding(resource)?;
        let controller = ResourceController::new(
            *binding,
            self.policy.clone(),
            self.engine.clone(),
            self.notifier.clone(),
        )
        .with_metrics(self.metrics.clone())
        .with_identity(self.identity.clone());
        Some(match &self.activity {
            Some(log) => controller.with_activity_log(log.clone()),
            None => controller,
        })
    }

    /// Navigation entries the session may open.
    pub fn menu(&self, session: &Session) -> Vec<MenuEntry> {
        visible_menu(&self.policy, session.role, DEFAULT_MENU)
    }

    /// Register an account and mirror its profile into the `profiles`
    /// collection so it shows up in user listings. When the store rejects the
    /// row the registration is undone, so it can be retried.
    pub async fn register(
        &self,
        username: &str,
        email: Option<String>,
    ) -> Result<Profile, ControllerError> {
        let profile = self.identity.register(username, email)?;
        let row = match serde_json::to_value(&profile) {
            Ok(Value::Object(map)) => map,
            _ => Record::new(),
        };
        if let Err(err) = self.engine.store().insert(PROFILES_COLLECTION, row).await {
            self.identity.remove_profile(&profile.id);
            warn!(username = %profile.username, error = %err, "registration rolled back");
            return Err(err.into());
        }
        Ok(profile)
    }

    /// Lead counters for the dashboard landing page, scoped to the session's
    /// site.
    pub async fn lead_stats(&self, session: &Session) -> Result<LeadStats, ControllerError> {
        if !self.policy.can_opt(session.role, "leads", Action::Read) {
            return Err(ControllerError::Unauthorized {
                role: session.role_name().to_owned(),
                resource: "leads".to_owned(),
                action: Action::Read,
            });
        }
        let site_field = self
            .engine
            .registry()
            .get("leads")
            .and_then(|schema| schema.site_field.clone());
        let mut filters = BTreeMap::new();
        if let (Some(field), Some(site_id)) = (site_field, &session.site_id) {
            filters.insert(field, Value::String(site_id.clone()));
        }
        let leads = self.engine.fetch_all("leads", &filters).await?;
        Ok(LeadStats::from_records(&leads))
    }
}
