//! ---
//! mops_section: "06-security-access-control"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Access policy, identity, and activity auditing."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use prometheus::{IntCounter, Registry};
use std::sync::Arc;

/// Access-control metrics exported via Prometheus.
#[derive(Clone)]
pub struct SecurityMetrics {
    access_checks_total: IntCounter,
    access_denials_total: IntCounter,
    activity_write_failures_total: IntCounter,
}

impl SecurityMetrics {
    /// Register metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> anyhow::Result<Self> {
        let access_checks_total =
            IntCounter::new("access_checks_total", "Total access policy evaluations")?;
        let access_denials_total =
            IntCounter::new("access_denials_total", "Access requests denied by policy")?;
        let activity_write_failures_total = IntCounter::new(
            "activity_write_failures_total",
            "Activity log entries that could not be written",
        )?;

        registry.register(Box::new(access_checks_total.clone()))?;
        registry.register(Box::new(access_denials_total.clone()))?;
        registry.register(Box::new(activity_write_failures_total.clone()))?;

        Ok(Self {
            access_checks_total,
            access_denials_total,
            activity_write_failures_total,
        })
    }

    /// Record one evaluated access decision.
    pub fn record_decision(&self, allowed: bool) {
        self.access_checks_total.inc();
        if !allowed {
            self.access_denials_total.inc();
        }
    }

    /// Increment activity log write failures.
    pub fn inc_activity_failure(&self) {
        self.activity_write_failures_total.inc();
    }
}
