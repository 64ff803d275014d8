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

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{Notification, Result};

/// Channel a notification is delivered through.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Name used in logs and metrics labels.
    fn name(&self) -> &str;

    /// Deliver one notification.
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Sink that keeps every delivered notification in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications delivered so far, in arrival order.
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().clone()
    }

    /// Number of notifications delivered so far.
    pub fn len(&self) -> usize {
        self.delivered.lock().len()
    }

    /// Whether nothing has been delivered.
    pub fn is_empty(&self) -> bool {
        self.delivered.lock().is_empty()
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        self.delivered.lock().push(notification.clone());
        Ok(())
    }
}

/// Sink that writes notifications to the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            target: "mops::notifications",
            recipient = ?notification.target,
            severity = %notification.severity,
            action_type = %notification.action_type,
            resource_type = notification.resource_type.as_deref().unwrap_or(""),
            resource_id = notification.resource_id.as_deref().unwrap_or(""),
            title = %notification.title,
            "{}",
            notification.message
        );
        Ok(())
    }
}
