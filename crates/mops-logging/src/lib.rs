//! ---
//! mops_section: "03-logging"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Structured logging adapters and sinks."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for development and the CLI.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// User id of the session performing the operation.
    pub actor: Option<&'a str>,
    /// Role of the session, as its wire name.
    pub role: Option<&'a str>,
    /// Backing-store collection touched by the operation.
    pub collection: Option<&'a str>,
    /// Resource identifier the permission table is keyed on.
    pub resource: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the acting user id.
    pub fn with_actor(mut self, actor: &'a str) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Attach the acting role.
    pub fn with_role(mut self, role: &'a str) -> Self {
        self.role = Some(role);
        self
    }

    /// Attach a collection name.
    pub fn with_collection(mut self, collection: &'a str) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Attach a resource name.
    pub fn with_resource(mut self, resource: &'a str) -> Self {
        self.resource = Some(resource);
        self
    }
}

/// Outcome of an access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    /// The policy granted the request.
    Allowed,
    /// The policy denied the request.
    Denied,
}

impl AccessOutcome {
    /// Map a boolean verdict onto an outcome.
    pub fn from_verdict(allowed: bool) -> Self {
        if allowed {
            AccessOutcome::Allowed
        } else {
            AccessOutcome::Denied
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            AccessOutcome::Allowed => "allowed",
            AccessOutcome::Denied => "denied",
        }
    }
}

/// Emit a standardized access decision event.
///
/// Allowed decisions are logged at debug, denials at warn.
pub fn log_access_decision(context: Option<&LogContext>, action: &str, outcome: AccessOutcome) {
    let ctx = context.cloned().unwrap_or_default();
    match outcome {
        AccessOutcome::Allowed => tracing::event!(
            Level::DEBUG,
            event = "access.decision",
            outcome = outcome.as_str(),
            actor = ctx.actor.unwrap_or(""),
            role = ctx.role.unwrap_or(""),
            resource = ctx.resource.unwrap_or(""),
            action,
        ),
        AccessOutcome::Denied => tracing::event!(
            Level::WARN,
            event = "access.decision",
            outcome = outcome.as_str(),
            actor = ctx.actor.unwrap_or(""),
            role = ctx.role.unwrap_or(""),
            resource = ctx.resource.unwrap_or(""),
            action,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new()
            .with_actor("user-1")
            .with_collection("leads");
        mops_info!(context = ctx.clone(), "page loaded");
        mops_debug!("debug message");
        mops_warn!(context = ctx, "retrying page {}", 2);
    }

    #[test]
    fn access_decision_helper_emits() {
        init();
        let ctx = LogContext::new()
            .with_actor("user-1")
            .with_role("client")
            .with_resource("users");
        log_access_decision(Some(&ctx), "write", AccessOutcome::Denied);
        log_access_decision(None, "read", AccessOutcome::from_verdict(true));
    }

    #[test]
    fn verdict_maps_to_outcome() {
        assert_eq!(AccessOutcome::from_verdict(false), AccessOutcome::Denied);
        assert_eq!(AccessOutcome::from_verdict(true).as_str(), "allowed");
    }
}
