//! ---
//! mops_section: "06-security-access-control"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Access policy, identity, and activity auditing."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
#![warn(missing_docs)]

pub mod audit;
pub mod identity;
pub mod metrics;
pub mod navigation;
pub mod rbac;

pub use audit::{ActivityEntry, ActivityLog, ActivityRecord};
pub use identity::{IdentityError, IdentityProvider, Profile, Session};
pub use metrics::SecurityMetrics;
pub use navigation::{visible_menu, MenuEntry, DEFAULT_MENU};
pub use rbac::{AccessPolicy, Action, PermissionRule, PolicyError, Role};
