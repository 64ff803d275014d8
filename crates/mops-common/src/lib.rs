//! ---
//! mops_section: "01-core-functionality"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Shared primitives and utilities for the dashboard core."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
//! Core shared primitives for the MOPS workspace.
//! This crate exposes configuration loading and tracing setup consumed by the
//! access, query, and notification crates as well as the `mopsctl` binary.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, AuditConfig, CollectionConfig, LoadedAppConfig, LoggingConfig,
    NotificationConfig, PaginationConfig, PolicyConfig,
};
pub use logging::{init_tracing, FilterSource, LogFormat};
