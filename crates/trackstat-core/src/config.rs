//! Configuration for the statistics engine
//!
//! Loadable from TOML; every field has a default so a partial file works.
//!
//! ```toml
//! stats_ttl_secs = 120
//! max_workers = 4
//! mature_states = ["review", "done", "closed", "resolved"]
//! ```

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Tuning knobs for aggregation, classification and caching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Lifetime of a cached statistics result
    pub stats_ttl_secs: u64,

    /// Lifetime of a cached reopened-bug list
    pub reopened_ttl_secs: u64,

    /// Lifetime of results built while a source was failing, and of empty
    /// reopened-bug lists
    pub degraded_ttl_secs: u64,

    /// Upper bound on classification workers
    pub max_workers: usize,

    /// Batches smaller than this are classified inline
    pub sequential_threshold: usize,

    /// Length cap of the recent-issues list
    pub recent_issue_limit: usize,

    /// Issue-type name counted as a bug (case-insensitive)
    pub bug_type: String,

    /// Status names counted as completed (case-insensitive, exact)
    pub completed_states: Vec<String>,

    /// Substrings marking closure-adjacent statuses
    pub mature_states: Vec<String>,

    /// Substrings marking early-workflow statuses
    pub early_states: Vec<String>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            stats_ttl_secs: 120,
            reopened_ttl_secs: 300,
            degraded_ttl_secs: 60,
            max_workers: default_workers(),
            sequential_threshold: 32,
            recent_issue_limit: 50,
            bug_type: "bug".to_string(),
            completed_states: strings(&["done", "closed", "resolved", "completed"]),
            mature_states: strings(&["review", "done", "closed", "resolved"]),
            early_states: strings(&[
                "to do",
                "todo",
                "open",
                "backlog",
                "in progress",
                "reopened",
                "request",
            ]),
        }
    }
}

impl StatsConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, CoreError> {
        let config: Self = toml::from_str(content).map_err(|e| CoreError::ConfigParse {
            path: origin.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Self::from_toml_str(&content, path)?;
        debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |message: &str| {
            Err(CoreError::InvalidConfig {
                message: message.to_string(),
            })
        };

        if self.stats_ttl_secs == 0 || self.reopened_ttl_secs == 0 || self.degraded_ttl_secs == 0 {
            return invalid("cache TTLs must be at least one second");
        }
        if self.max_workers == 0 {
            return invalid("max_workers must be at least 1");
        }
        if self.recent_issue_limit == 0 {
            return invalid("recent_issue_limit must be at least 1");
        }
        if self.bug_type.trim().is_empty() {
            return invalid("bug_type must not be empty");
        }
        if !has_entries(&self.mature_states) || !has_entries(&self.early_states) {
            return invalid("mature_states and early_states need at least one non-empty entry");
        }
        Ok(())
    }

    pub fn stats_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_ttl_secs)
    }

    pub fn reopened_ttl(&self) -> Duration {
        Duration::from_secs(self.reopened_ttl_secs)
    }

    pub fn degraded_ttl(&self) -> Duration {
        Duration::from_secs(self.degraded_ttl_secs)
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn has_entries(values: &[String]) -> bool {
    values.iter().any(|v| !v.trim().is_empty())
}
