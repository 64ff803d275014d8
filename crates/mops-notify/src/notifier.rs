//! ---
//! mops_section: "08-notifications"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Notification model, sinks, and asynchronous fan-out."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use mops_common::config::NotificationConfig;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::metrics::NotifyMetrics;
use crate::sink::NotificationSink;
use crate::{Notification, NotifyError, Target};

/// Snapshot of delivery counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NotifyStats {
    /// Successful sink deliveries.
    pub sent: u64,
    /// Sink deliveries that failed or timed out.
    pub failed: u64,
    /// Notifications never dispatched because no runtime was available.
    pub dropped: u64,
}

/// Outcome of delivering one notification to every sink.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Sinks that accepted the notification.
    pub delivered: usize,
    /// Sinks that failed or timed out.
    pub failed: usize,
}

#[derive(Default)]
struct Counters {
    sent: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> NotifyStats {
        NotifyStats {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Fire-and-forget fan-out of notifications to every registered sink.
///
/// `notify*` calls return as soon as delivery is spawned. Sink failures are
/// logged and counted, never returned.
#[derive(Clone)]
pub struct Notifier {
    sinks: Arc<Vec<Arc<dyn NotificationSink>>>,
    timeout: Duration,
    enabled: bool,
    counters: Arc<Counters>,
    metrics: Option<NotifyMetrics>,
}

impl Notifier {
    /// Notifier with no sinks and the given per-sink delivery timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            sinks: Arc::new(Vec::new()),
            timeout,
            enabled: true,
            counters: Arc::new(Counters::default()),
            metrics: None,
        }
    }

    /// Notifier configured from the `notifications` section.
    pub fn from_config(config: &NotificationConfig) -> Self {
        let mut notifier = Self::new(config.delivery_timeout);
        notifier.enabled = config.enabled;
        notifier
    }

    /// Add a sink.
    pub fn with_sink<S>(mut self, sink: Arc<S>) -> Self
    where
        S: NotificationSink + 'static,
    {
        Arc::make_mut(&mut self.sinks).push(sink as Arc<dyn NotificationSink>);
        self
    }

    /// Attach Prometheus counters.
    pub fn with_metrics(mut self, metrics: NotifyMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Whether dispatch is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of registered sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Current delivery counters.
    pub fn stats(&self) -> NotifyStats {
        self.counters.snapshot()
    }

    /// Spawn delivery of `notification` on the current tokio runtime and return
    /// immediately. Returns `None` when nothing was spawned.
    pub fn notify(&self, notification: Notification) -> Option<JoinHandle<DeliveryReport>> {
        if !self.enabled {
            debug!(action_type = %notification.action_type, "notifications disabled; skipping");
            return None;
        }
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(
                    action_type = %notification.action_type,
                    "no async runtime available; notification dropped"
                );
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        let notifier = self.clone();
        Some(handle.spawn(async move { notifier.deliver(&notification).await }))
    }

    /// Notify one user.
    pub fn notify_user(
        &self,
        user_id: impl Into<String>,
        notification: Notification,
    ) -> Option<JoinHandle<DeliveryReport>> {
        self.notify(notification.retarget(Target::User(user_id.into())))
    }

    /// Notify every administrator.
    pub fn notify_admins(&self, notification: Notification) -> Option<JoinHandle<DeliveryReport>> {
        self.notify(notification.retarget(Target::AllAdmins))
    }

    /// Notify one user and every administrator; both deliveries run
    /// concurrently inside a single spawned task.
    pub fn notify_user_and_admins(
        &self,
        user_id: impl Into<String>,
        notification: Notification,
    ) -> Option<JoinHandle<DeliveryReport>> {
        let to_user = notification.retarget(Target::User(user_id.into()));
        let to_admins = notification.retarget(Target::AllAdmins);
        if !self.enabled {
            return None;
        }
        let Ok(handle) = Handle::try_current() else {
            warn!(
                action_type = %notification.action_type,
                "no async runtime available; notifications dropped"
            );
            self.counters.dropped.fetch_add(2, Ordering::Relaxed);
            return None;
        };
        let notifier = self.clone();
        Some(handle.spawn(async move {
            let (user, admins) =
                futures::join!(notifier.deliver(&to_user), notifier.deliver(&to_admins));
            DeliveryReport {
                delivered: user.delivered + admins.delivered,
                failed: user.failed + admins.failed,
            }
        }))
    }

    /// Deliver to every sink concurrently and wait for the outcome. Each sink
    /// is bounded by the delivery timeout.
    pub async fn deliver(&self, notification: &Notification) -> DeliveryReport {
        let attempts = self.sinks.iter().map(|sink| async move {
            let outcome = match tokio::time::timeout(self.timeout, sink.deliver(notification)).await
            {
                Ok(result) => result,
                Err(_) => Err(NotifyError::Timeout(self.timeout)),
            };
            (sink.name().to_owned(), outcome)
        });

        let mut report = DeliveryReport::default();
        for (sink, outcome) in join_all(attempts).await {
            match outcome {
                Ok(()) => {
                    report.delivered += 1;
                    self.counters.sent.fetch_add(1, Ordering::Relaxed);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_sent(&sink);
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        sink = %sink,
                        action_type = %notification.action_type,
                        error = %err,
                        "notification delivery failed"
                    );
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_failed(&sink);
                    }
                }
            }
        }
        report
    }
}
