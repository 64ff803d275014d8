//! ---
//! mops_section: "06-security-access-control"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Access policy, identity, and activity auditing."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Mutation to be recorded in the activity log.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    /// User id of the actor.
    pub actor: String,
    /// Action name (e.g. `create_user`, `delete_blog`).
    pub action: String,
    /// Resource kind (e.g. `user`, `blog`).
    pub resource_type: String,
    /// Identifier of the affected record.
    pub resource_id: String,
    /// Additional context.
    pub details: serde_json::Value,
}

impl ActivityRecord {
    /// Construct a record with empty details.
    pub fn new(
        actor: impl Into<String>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Attach details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Entry recorded in the activity log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    /// Timestamp when the mutation was recorded.
    pub timestamp: DateTime<Utc>,
    /// Actor responsible for the mutation.
    pub actor: String,
    /// Action name.
    pub action: String,
    /// Resource kind.
    pub resource_type: String,
    /// Affected record id.
    pub resource_id: String,
    /// Additional context serialized as JSON.
    pub details: serde_json::Value,
    /// SHA-256 hash of the entry contents and previous hash.
    pub hash: String,
    /// Hash of the previous entry (or zero string for the first entry).
    pub previous_hash: String,
}

impl ActivityEntry {
    fn compute_hash(
        timestamp: DateTime<Utc>,
        record: &ActivityRecord,
        previous_hash: &str,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(
            timestamp
                .timestamp_nanos_opt()
                .unwrap_or_default()
                .to_be_bytes(),
        );
        for field in [
            &record.actor,
            &record.action,
            &record.resource_type,
            &record.resource_id,
        ] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update(record.details.to_string().as_bytes());
        hasher.update(previous_hash.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn record(&self) -> ActivityRecord {
        ActivityRecord {
            actor: self.actor.clone(),
            action: self.action.clone(),
            resource_type: self.resource_type.clone(),
            resource_id: self.resource_id.clone(),
            details: self.details.clone(),
        }
    }
}

/// Activity log backed by a newline-delimited JSON file.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    path: PathBuf,
    last_hash: String,
}

impl ActivityLog {
    /// Open an activity log at the given path. Existing entries are loaded to
    /// determine the head hash.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut log = Self {
            path: path.clone(),
            last_hash: "0".repeat(64),
        };
        if let Some(last) = log.entries()?.pop() {
            log.last_hash = last.hash;
        }
        Ok(log)
    }

    /// Location of the log on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a new entry to the log.
    pub fn append(&mut self, record: ActivityRecord) -> Result<ActivityEntry> {
        let timestamp = Utc::now();
        let hash = ActivityEntry::compute_hash(timestamp, &record, &self.last_hash);
        let entry = ActivityEntry {
            timestamp,
            actor: record.actor,
            action: record.action,
            resource_type: record.resource_type,
            resource_id: record.resource_id,
            details: record.details,
            hash: hash.clone(),
            previous_hash: self.last_hash.clone(),
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("unable to create activity log directory {}", parent.display())
                })?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("unable to open activity log {}", self.path.display()))?;
        file.write_all(serde_json::to_string(&entry)?.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        self.last_hash = hash;
        Ok(entry)
    }

    /// Read every entry in file order.
    pub fn entries(&self) -> Result<Vec<ActivityEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for line in BufReader::new(fs::File::open(&self.path)?).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: ActivityEntry = serde_json::from_str(&line)
                .with_context(|| format!("corrupt activity entry in {}", self.path.display()))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Verify integrity of the log (detect tampering).
    pub fn verify(&self) -> Result<bool> {
        let mut previous = "0".repeat(64);
        for entry in self.entries()? {
            if entry.previous_hash != previous {
                return Ok(false);
            }
            let expected = ActivityEntry::compute_hash(entry.timestamp, &entry.record(), &previous);
            if expected != entry.hash {
                return Ok(false);
            }
            previous = entry.hash;
        }
        Ok(true)
    }
}
