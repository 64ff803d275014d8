//! ---
//! mops_section: "05-external-interfaces"
//! mops_subsection: "binary"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Control CLI for administrators inspecting MOPS."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use mops_common::{init_tracing, AppConfig};
use mops_logging as logging;

mod access;
mod audit;
mod data;

#[derive(Debug, Parser)]
#[command(author, version, about = "MOPS administrative control utility", long_about = None)]
struct Cli {
    /// Configuration file (falls back to MOPS_CONFIG, then configs/mops.toml).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Log through the configured stdout and rolling-file pipeline instead of stderr.
    #[arg(long, global = true)]
    log_files: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Evaluate one permission.
    Check(access::CheckCommand),
    /// Show the navigation entries visible to a role.
    Menu(access::MenuCommand),
    /// List every permission a role holds, or the whole table.
    Grants(access::GrantsCommand),
    /// Page through a collection of a JSON data file.
    List(data::ListCommand),
    /// Lead counters of a JSON data file.
    Stats(data::StatsCommand),
    #[command(subcommand, about = "Activity log actions")]
    Audit(audit::AuditCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    if cli.log_files {
        init_tracing("mopsctl", &config.logging)?;
    } else {
        logging::init();
    }
    match cli.command {
        Commands::Check(cmd) => access::check(cmd, &config)?,
        Commands::Menu(cmd) => access::menu(cmd, &config)?,
        Commands::Grants(cmd) => access::grants(cmd, &config)?,
        Commands::List(cmd) => data::list(cmd, &config)?,
        Commands::Stats(cmd) => data::stats(cmd, &config)?,
        Commands::Audit(cmd) => audit::run(cmd, &config)?,
    }
    Ok(())
}

/// An explicit `--config` must load; otherwise a missing file means defaults.
fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return AppConfig::from_path(path.to_path_buf());
    }
    let candidates = [PathBuf::from("configs/mops.toml")];
    let env_set = std::env::var_os(AppConfig::ENV_CONFIG_PATH).is_some_and(|v| !v.is_empty());
    if !env_set && !candidates.iter().any(|path| path.exists()) {
        return Ok(AppConfig::default());
    }
    AppConfig::load(&candidates)
}
