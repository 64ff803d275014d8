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

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use mops_common::AppConfig;
use mops_security::ActivityLog;

#[derive(Debug, Subcommand)]
pub enum AuditCommand {
    /// Check the hash chain of an activity log.
    Verify(VerifyOptions),
    /// Print the entries of an activity log.
    Show(VerifyOptions),
}

#[derive(Debug, Args)]
pub struct VerifyOptions {
    /// Log file; defaults to the configured audit path.
    path: Option<PathBuf>,
}

pub fn run(command: AuditCommand, config: &AppConfig) -> Result<()> {
    match command {
        AuditCommand::Verify(opts) => {
            let log = ActivityLog::new(opts.path.unwrap_or_else(|| config.audit.path.clone()))?;
            let count = log.entries()?.len();
            if !log.verify()? {
                bail!("activity log {} failed verification", log.path().display());
            }
            println!("{}: {count} entries, chain intact", log.path().display());
        }
        AuditCommand::Show(opts) => {
            let log = ActivityLog::new(opts.path.unwrap_or_else(|| config.audit.path.clone()))?;
            for entry in log.entries()? {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }
    }
    Ok(())
}
