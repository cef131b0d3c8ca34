//! Error types for trackstat-core
//!
//! Configuration errors are surfaced to the caller. Everything else is
//! recovered locally and recorded in a [`DegradationReport`] so a statistics
//! request still yields a best-effort result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for trackstat operations
#[derive(Error, Debug)]
pub enum CoreError {
    // ===================
    // Source Errors
    // ===================
    #[error("{source_name} unavailable: {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },

    #[error("Failed to read issue export: {path}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse issue export {path}: {message}")]
    SourceParse {
        path: PathBuf,
        message: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed issue record {key}: {message}")]
    MalformedRecord { key: String, message: String },

    // ===================
    // Classification Errors
    // ===================
    #[error("Cannot classify status history of {issue_key}: {reason}")]
    Classification { issue_key: String, reason: String },

    // ===================
    // Configuration Errors
    // ===================
    #[error("Invalid project key: {key:?}")]
    InvalidProjectKey { key: String },

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("No project keys given")]
    NoProjects,

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl CoreError {
    /// True for errors the caller must fix; these never reach the cache
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidProjectKey { .. }
                | CoreError::InvalidDateRange { .. }
                | CoreError::NoProjects
                | CoreError::InvalidConfig { .. }
                | CoreError::ConfigRead { .. }
                | CoreError::ConfigParse { .. }
        )
    }

    pub(crate) fn source_unavailable(
        source_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CoreError::SourceUnavailable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Severity of a recovered failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A single issue was skipped; totals are otherwise complete
    Warning,
    /// A whole input (issues, participants) was substituted with an empty default
    Error,
}

/// One recovered failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    /// Which input failed ("issues", "participants", "classify:PROJ-1", ...)
    pub source: String,
    pub message: String,
    pub severity: Severity,
}

/// Recovered failures collected while building one statistics result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradationReport {
    pub entries: Vec<Degradation>,
}

impl DegradationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_warning(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.entries.push(Degradation {
            source: source.into(),
            message: message.into(),
            severity: Severity::Warning,
        });
    }

    pub fn add_error(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.entries.push(Degradation {
            source: source.into(),
            message: message.into(),
            severity: Severity::Error,
        });
    }

    /// Record a recovered [`CoreError`], picking severity from its class
    pub fn record(&mut self, source: impl Into<String>, error: &CoreError) {
        match error {
            CoreError::Classification { .. } | CoreError::MalformedRecord { .. } => {
                self.add_warning(source, error.to_string())
            }
            _ => self.add_error(source, error.to_string()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_degraded(&self) -> bool {
        !self.is_healthy()
    }

    /// Returns (warnings, errors)
    pub fn counts(&self) -> (usize, usize) {
        let warnings = self
            .entries
            .iter()
            .filter(|e| e.severity == Severity::Warning)
            .count();
        (warnings, self.entries.len() - warnings)
    }

    /// Merge another report into this one
    pub fn merge(&mut self, other: DegradationReport) {
        self.entries.extend(other.entries);
    }
}
