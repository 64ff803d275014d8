//! ---
//! mops_section: "01-core-functionality"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Shared primitives and utilities for the dashboard core."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "MOPS_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static STDOUT_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Available log formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
    /// Single-line output without span context, for interactive CLI use.
    Compact,
}

/// Where the filter directive in force came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSource {
    /// `MOPS_LOG`.
    MopsLog,
    /// `RUST_LOG`.
    RustLog,
    /// `logging.level` in the configuration file.
    Config,
    /// Nothing set; `info`.
    Default,
}

/// Parse a filter directive such as `info,mops_query=debug`.
pub fn parse_directive(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive).map_err(Into::into)
}

/// Pick the filter directive: `MOPS_LOG`, then `RUST_LOG`, then the configured
/// level, then `info`. Blank values count as unset.
pub fn resolve_directive(
    mops_log: Option<String>,
    rust_log: Option<String>,
    configured: Option<&str>,
) -> (String, FilterSource) {
    let set = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
    if let Some(directive) = set(mops_log) {
        return (directive, FilterSource::MopsLog);
    }
    if let Some(directive) = set(rust_log) {
        return (directive, FilterSource::RustLog);
    }
    match configured.map(str::to_owned).filter(|v| !v.trim().is_empty()) {
        Some(directive) => (directive, FilterSource::Config),
        None => (DEFAULT_DIRECTIVE.to_owned(), FilterSource::Default),
    }
}

/// Log file written by [`init_tracing`] for `service_name`, without the date
/// suffix the daily roller appends.
pub fn log_file_name(service_name: &str, config: &LoggingConfig) -> String {
    match config.file_prefix.as_deref() {
        Some(prefix) if !prefix.trim().is_empty() => format!("{prefix}-{service_name}.log"),
        _ => format!("{service_name}.log"),
    }
}

/// Initialize the tracing subscriber from the `logging` section.
///
/// An environment directive that fails to parse falls back to the configured
/// level; a configured level that fails to parse is an error. Returns the log
/// directory when file output is enabled.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<Option<PathBuf>> {
    let (directive, source) = resolve_directive(
        std::env::var(LOG_ENV).ok(),
        std::env::var("RUST_LOG").ok(),
        config.level.as_deref(),
    );
    let filter = match parse_directive(&directive) {
        Ok(filter) => filter,
        Err(err) if source != FilterSource::Config => {
            eprintln!("ignoring invalid log directive '{directive}' ({err})");
            let (fallback, _) = resolve_directive(None, None, config.level.as_deref());
            parse_directive(&fallback)
                .with_context(|| format!("invalid logging.level '{fallback}'"))?
        }
        Err(err) => return Err(err.context(format!("invalid logging.level '{directive}'"))),
    };

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let _ = STDOUT_GUARD.set(stdout_guard);
    let stdout_layer = match config.format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(stdout_writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(stdout_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .without_time()
            .with_target(false)
            .with_writer(stdout_writer)
            .boxed(),
    };

    let file_layer = if config.files {
        std::fs::create_dir_all(&config.directory).with_context(|| {
            format!("failed to create log directory {}", config.directory.display())
        })?;
        let appender = daily(&config.directory, log_file_name(service_name, config));
        let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(file_guard);
        Some(
            fmt::layer()
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .json()
                .with_writer(file_writer)
                .boxed(),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .ok();

    let log_dir = config.files.then(|| config.directory.clone());
    info!(
        service = %service_name,
        filter = %directive,
        filter_source = ?source,
        format = ?config.format,
        log_dir = ?log_dir,
        "tracing initialised"
    );
    Ok(log_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_precedence() {
        let pick = |mops: Option<&str>, rust: Option<&str>, cfg: Option<&str>| {
            resolve_directive(mops.map(Into::into), rust.map(Into::into), cfg)
        };
        assert_eq!(
            pick(Some("debug"), Some("warn"), Some("error")),
            ("debug".to_owned(), FilterSource::MopsLog)
        );
        assert_eq!(
            pick(Some("  "), Some("warn"), None),
            ("warn".to_owned(), FilterSource::RustLog)
        );
        assert_eq!(
            pick(None, None, Some("info,mops_query=debug")),
            ("info,mops_query=debug".to_owned(), FilterSource::Config)
        );
        assert_eq!(pick(None, None, None), ("info".to_owned(), FilterSource::Default));
    }

    #[test]
    fn file_names_carry_the_prefix() {
        let mut config = LoggingConfig::default();
        assert_eq!(log_file_name("mopsctl", &config), "mopsctl.log");
        config.file_prefix = Some("prod".into());
        assert_eq!(log_file_name("mopsctl", &config), "prod-mopsctl.log");
    }

    #[test]
    fn invalid_directives_are_rejected() {
        assert!(parse_directive("info,mops_query=debug").is_ok());
        assert!(parse_directive("mops_query=loud").is_err());
    }

    #[test]
    fn init_creates_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            directory: dir.path().join("logs"),
            format: LogFormat::Compact,
            file_prefix: Some("test".into()),
            level: Some("debug".into()),
            files: true,
        };
        let log_dir = init_tracing("mops-test", &config).unwrap();
        assert_eq!(log_dir.as_deref(), Some(config.directory.as_path()));
        assert!(config.directory.is_dir());
    }
}
