//! ---
//! mops_section: "08-notifications"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Notification model, sinks, and asynchronous fan-out."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use std::sync::Arc;

use prometheus::{IntCounterVec, Opts, Registry};

/// Prometheus counters for notification delivery, labelled by sink.
#[derive(Clone)]
pub struct NotifyMetrics {
    sent: IntCounterVec,
    failed: IntCounterVec,
    #[allow(dead_code)]
    registry: Arc<Registry>,
}

impl NotifyMetrics {
    /// Register the counters with `registry`.
    pub fn new(registry: Arc<Registry>) -> prometheus::Result<Self> {
        let sent = IntCounterVec::new(
            Opts::new("notifications_sent_total", "Notifications delivered to a sink"),
            &["sink"],
        )?;
        registry.register(Box::new(sent.clone()))?;

        let failed = IntCounterVec::new(
            Opts::new(
                "notifications_failed_total",
                "Notification deliveries that failed or timed out",
            ),
            &["sink"],
        )?;
        registry.register(Box::new(failed.clone()))?;

        Ok(Self {
            sent,
            failed,
            registry,
        })
    }

    /// Record one successful delivery.
    pub fn record_sent(&self, sink: &str) {
        self.sent.with_label_values(&[sink]).inc();
    }

    /// Record one failed delivery.
    pub fn record_failed(&self, sink: &str) {
        self.failed.with_label_values(&[sink]).inc();
    }

    /// Failures recorded for `sink`.
    pub fn failures(&self, sink: &str) -> u64 {
        self.failed.with_label_values(&[sink]).get()
    }
}
