//! ---
//! mops_section: "01-core-functionality"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Resource controllers and dashboard wiring."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
//! Dashboard core: permission-gated resource controllers over the pagination
//! engine, with notification fan-out and activity auditing on every mutation.

use mops_query::{QueryError, StoreError};
use mops_security::{Action, IdentityError};

pub mod bindings;
pub mod controller;
pub mod dashboard;
pub mod sink;
pub mod ticket;

pub use bindings::{binding, Recipient, ResourceBinding, BUILTIN_BINDINGS, PROFILES_COLLECTION};
pub use controller::{MutationOutcome, ResourceController};
pub use dashboard::DashboardCore;
pub use sink::CollectionSink;
pub use ticket::{RequestSequencer, RequestTicket};

/// Errors surfaced by controllers.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The session's role does not hold the permission. Raised before any
    /// store access.
    #[error("role {role} may not {action} {resource}")]
    Unauthorized {
        /// Role name of the caller, `unknown` when unrecognised.
        role: String,
        /// Resource the permission is keyed on.
        resource: String,
        /// Attempted action.
        action: Action,
    },
    /// Request payload failed validation. Raised before any store access.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Page query rejected or failed.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// Backing store failed during a mutation.
    #[error("store error: {0}")]
    Store(StoreError),
    /// Target record does not exist.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Resource kind.
        resource: String,
        /// Missing id.
        id: String,
    },
    /// Identity provider refused the operation.
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl From<StoreError> for ControllerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => ControllerError::NotFound {
                resource: collection,
                id,
            },
            other => ControllerError::Store(other),
        }
    }
}

impl ControllerError {
    /// Whether the error is a permission denial.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ControllerError::Unauthorized { .. })
    }
}
