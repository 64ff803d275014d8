//! ---
//! mops_section: "01-core-functionality"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Shared primitives and utilities for the dashboard core."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_true() -> bool {
    true
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_page_size() -> u32 {
    20
}

fn default_max_page_size() -> u32 {
    100
}

fn default_notifications_enabled() -> bool {
    true
}

fn default_delivery_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_audit_path() -> PathBuf {
    PathBuf::from("target/audit/activity.log")
}

fn default_audit_enabled() -> bool {
    true
}

/// Primary configuration object for the dashboard core.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    /// Per-collection overrides keyed by collection name.
    #[serde(default)]
    pub collections: IndexMap<String, CollectionConfig>,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "MOPS_CONFIG";

    /// Load configuration from disk, respecting the `MOPS_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Read and validate a configuration file at a concrete path.
    pub fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Retrieve the override block for a collection, if any.
    pub fn collection(&self, name: &str) -> Option<&CollectionConfig> {
        self.collections.get(name)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if let Some(level) = &self.logging.level {
            crate::logging::parse_directive(level)
                .with_context(|| format!("invalid logging.level '{level}'"))?;
        }
        self.pagination.validate()?;
        for (name, collection) in &self.collections {
            collection.validate(name)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Filter directive used when neither `MOPS_LOG` nor `RUST_LOG` is set,
    /// e.g. `info,mops_query=debug`.
    #[serde(default)]
    pub level: Option<String>,
    /// Also write the daily rolling JSON file.
    #[serde(default = "default_true")]
    pub files: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            level: None,
            files: true,
        }
    }
}

/// Where the permission table comes from. `None` selects the built-in table.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PolicyConfig {
    #[serde(default)]
    pub rules_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl PaginationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_page_size == 0 {
            return Err(anyhow!("pagination.max_page_size must be at least 1"));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(anyhow!(
                "pagination.default_page_size must be between 1 and {} (got {})",
                self.max_page_size,
                self.default_page_size
            ));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_notifications_enabled")]
    pub enabled: bool,
    #[serde(default = "default_delivery_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub delivery_timeout: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifications_enabled(),
            delivery_timeout: default_delivery_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    #[serde(default = "default_audit_path")]
    pub path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: default_audit_path(),
        }
    }
}

/// Overrides applied on top of a collection's built-in schema.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CollectionConfig {
    #[serde(default)]
    pub search_fields: Option<Vec<String>>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub descending: Option<bool>,
    #[serde(default)]
    pub site_field: Option<String>,
}

impl CollectionConfig {
    pub fn validate(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(anyhow!("collection names cannot be empty"));
        }
        if let Some(fields) = &self.search_fields {
            if fields.iter().any(|field| field.trim().is_empty()) {
                return Err(anyhow!(
                    "collection '{}' declares an empty search field",
                    name
                ));
            }
        }
        if matches!(&self.order_by, Some(field) if field.trim().is_empty()) {
            return Err(anyhow!("collection '{}' declares an empty order_by", name));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_str("").unwrap();
        assert_eq!(config.pagination.default_page_size, 20);
        assert_eq!(config.pagination.max_page_size, 100);
        assert!(config.notifications.enabled);
        assert_eq!(config.notifications.delivery_timeout, Duration::from_secs(5));
        assert!(config.policy.rules_path.is_none());
    }

    #[test]
    fn parses_collection_overrides() {
        let raw = r#"
            [pagination]
            default_page_size = 10
            max_page_size = 50

            [notifications]
            delivery_timeout = 250

            [collections.leads]
            search_fields = ["name", "email"]
            order_by = "created_at"
            descending = true
            site_field = "site_id"
        "#;
        let config = AppConfig::from_str(raw).unwrap();
        assert_eq!(config.pagination.max_page_size, 50);
        assert_eq!(
            config.notifications.delivery_timeout,
            Duration::from_millis(250)
        );
        let leads = config.collection("leads").unwrap();
        assert_eq!(
            leads.search_fields.as_deref(),
            Some(&["name".to_string(), "email".to_string()][..])
        );
        assert_eq!(leads.site_field.as_deref(), Some("site_id"));
    }

    #[test]
    fn logging_level_is_validated() {
        let config = AppConfig::from_str(
            "[logging]\nformat = \"compact\"\nlevel = \"info,mops_query=debug\"\nfiles = false\n",
        )
        .unwrap();
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(!config.logging.files);
        assert!(AppConfig::from_str("[logging]\nlevel = \"mops_query=loud\"\n").is_err());
    }

    #[test]
    fn rejects_default_page_size_above_max() {
        let raw = r#"
            [pagination]
            default_page_size = 200
            max_page_size = 100
        "#;
        assert!(AppConfig::from_str(raw).is_err());
    }

    #[test]
    fn rejects_blank_search_field() {
        let raw = r#"
            [collections.profiles]
            search_fields = ["username", " "]
        "#;
        assert!(AppConfig::from_str(raw).is_err());
    }

    #[test]
    fn loads_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mops.toml");
        fs::write(&path, "[pagination]\nmax_page_size = 40\n").unwrap();
        let missing = dir.path().join("missing.toml");
        let loaded = AppConfig::load_with_source(&[missing.clone(), path.clone()]).unwrap();
        assert_eq!(loaded.source, path);
        assert_eq!(loaded.config.pagination.max_page_size, 40);
        assert!(AppConfig::load(&[missing]).is_err());
    }
}
