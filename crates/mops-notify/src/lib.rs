//! ---
//! mops_section: "08-notifications"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Notification model, sinks, and asynchronous fan-out."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
#![warn(missing_docs)]

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Result alias used throughout the notification crate.
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Delivery failures reported by sinks. The [`Notifier`] logs and counts these;
/// they never reach the operation that triggered the notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The downstream channel could not be reached.
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
    /// The channel refused the notification.
    #[error("notification rejected: {0}")]
    Rejected(String),
    /// Delivery did not complete in time.
    #[error("notification delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// Visual severity of a notification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    /// Completed operation.
    Success,
    /// Failed operation.
    Error,
    /// Neutral information.
    #[default]
    Info,
    /// Destructive or otherwise noteworthy operation.
    Warning,
}

/// Recipient of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum Target {
    /// A single user.
    User(String),
    /// Every admin-class user.
    AllAdmins,
}

/// One message to deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Who receives it.
    pub target: Target,
    /// Short headline.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Display severity.
    pub severity: Severity,
    /// Operation that produced it, e.g. `create_blog`.
    pub action_type: String,
    /// Kind of resource involved.
    pub resource_type: Option<String>,
    /// Identifier of the resource involved.
    pub resource_id: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Informational notification for `target`.
    pub fn new(
        target: Target,
        title: impl Into<String>,
        message: impl Into<String>,
        action_type: impl Into<String>,
    ) -> Self {
        Self {
            target,
            title: title.into(),
            message: message.into(),
            severity: Severity::default(),
            action_type: action_type.into(),
            resource_type: None,
            resource_id: None,
            created_at: Utc::now(),
        }
    }

    /// Set the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attach the resource the notification refers to.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Same content, different recipient.
    pub fn retarget(&self, target: Target) -> Self {
        Self {
            target,
            ..self.clone()
        }
    }
}

pub mod metrics;
pub mod notifier;
pub mod sink;

pub use metrics::NotifyMetrics;
pub use notifier::{DeliveryReport, NotifyStats, Notifier};
pub use sink::{LogSink, MemorySink, NotificationSink};
