//! ---
//! mops_section: "05-external-interfaces"
//! mops_subsection: "binary"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Control CLI for administrators inspecting MOPS."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use mops_common::AppConfig;
use mops_logging::{log_access_decision, AccessOutcome, LogContext};
use mops_security::{visible_menu, AccessPolicy, Role, DEFAULT_MENU};

#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Role name, e.g. `sales_manager`.
    role: String,
    /// Resource name, e.g. `leads`.
    resource: String,
    /// One of `read`, `write`, `delete`.
    action: String,
    /// Policy file replacing the configured table.
    #[arg(long, value_name = "FILE")]
    policy: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct MenuCommand {
    role: String,
    #[arg(long, value_name = "FILE")]
    policy: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct GrantsCommand {
    /// Role to list; every rule of the table when omitted.
    role: Option<String>,
    #[arg(long, value_name = "FILE")]
    policy: Option<PathBuf>,
}

fn load_policy(explicit: Option<&PathBuf>, config: &AppConfig) -> Result<AccessPolicy> {
    match explicit.or(config.policy.rules_path.as_ref()) {
        Some(path) => AccessPolicy::load(path)
            .with_context(|| format!("failed to load policy from {}", path.display())),
        None => Ok(AccessPolicy::builtin()),
    }
}

fn known_role(name: &str) -> Result<Role> {
    Role::parse(name).ok_or_else(|| anyhow!("unknown role '{name}'"))
}

pub fn check(cmd: CheckCommand, config: &AppConfig) -> Result<()> {
    let policy = load_policy(cmd.policy.as_ref(), config)?;
    let allowed = policy.can_str(&cmd.role, &cmd.resource, &cmd.action);
    let context = LogContext::new()
        .with_role(&cmd.role)
        .with_resource(&cmd.resource);
    log_access_decision(
        Some(&context),
        &cmd.action,
        AccessOutcome::from_verdict(allowed),
    );
    println!(
        "{} {} {}: {}",
        cmd.role,
        cmd.action,
        cmd.resource,
        if allowed { "allowed" } else { "denied" }
    );
    Ok(())
}

pub fn menu(cmd: MenuCommand, config: &AppConfig) -> Result<()> {
    let policy = load_policy(cmd.policy.as_ref(), config)?;
    let role = known_role(&cmd.role)?;
    for entry in visible_menu(&policy, Some(role), DEFAULT_MENU) {
        println!("{:<18} {}", entry.name, entry.href);
    }
    Ok(())
}

pub fn grants(cmd: GrantsCommand, config: &AppConfig) -> Result<()> {
    let policy = load_policy(cmd.policy.as_ref(), config)?;
    let Some(role) = cmd.role else {
        for rule in policy.rules() {
            let roles: Vec<&str> = rule.roles.iter().map(|role| role.as_str()).collect();
            println!("{}:{} {}", rule.resource, rule.action, roles.join(","));
        }
        return Ok(());
    };
    let role = known_role(&role)?;
    for (resource, action) in policy.grants_for(role) {
        println!("{resource}:{action}");
    }
    Ok(())
}
