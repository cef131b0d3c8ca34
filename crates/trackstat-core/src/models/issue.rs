//! Typed issue records
//!
//! Produced once at the source boundary (see `parsers::jira`); the
//! aggregation core relies on these fields being present.

use super::identity::Identity;
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field name of status transitions in a change history
pub const STATUS_FIELD: &str = "status";

/// Newtype for a validated, uppercased project key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectKey(String);

impl ProjectKey {
    /// Validate and normalize a project key
    ///
    /// Keys are trimmed and uppercased; empty keys and keys with characters
    /// outside `[A-Za-z0-9_]` are rejected.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        let valid = !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');

        if !valid {
            return Err(CoreError::InvalidProjectKey {
                key: raw.to_string(),
            });
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ProjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One field change in an issue's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub timestamp: DateTime<Utc>,
    /// Who made the change (absent for automation)
    pub author: Option<Identity>,
    pub field: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

impl ChangeEvent {
    pub fn is_status_change(&self) -> bool {
        self.field.eq_ignore_ascii_case(STATUS_FIELD)
    }
}

/// An issue as retrieved from the tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRecord {
    pub key: String,
    pub project: ProjectKey,
    pub summary: String,
    pub status: String,
    pub issue_type: String,
    pub priority: Option<String>,
    pub assignee: Option<Identity>,
    pub reporter: Option<Identity>,
    /// Distinct comment authors, first-comment order
    #[serde(default)]
    pub commenters: Vec<Identity>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Change history, oldest first
    #[serde(default)]
    pub changes: Vec<ChangeEvent>,
    /// Set when the tracker returned a history that could not be parsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_error: Option<String>,
}

impl IssueRecord {
    /// Case-insensitive issue-type comparison
    pub fn is_type(&self, issue_type: &str) -> bool {
        self.issue_type.eq_ignore_ascii_case(issue_type)
    }

    /// Status-field changes in chronological order
    pub fn status_changes(&self) -> impl Iterator<Item = &ChangeEvent> {
        self.changes.iter().filter(|c| c.is_status_change())
    }
}

/// A detected move from a closure-adjacent status back to an earlier one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReopenEvent {
    pub issue_key: String,
    pub timestamp: DateTime<Utc>,
    pub from_status: String,
    pub to_status: String,
    pub actor: Option<Identity>,
}

impl ReopenEvent {
    /// Name used for the reopener histogram
    pub fn actor_name(&self) -> &str {
        self.actor
            .as_ref()
            .map(|a| a.display_name.as_str())
            .unwrap_or(super::identity::UNKNOWN_USER)
    }
}

/// A reopened bug paired with its first reopen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReopenedBug {
    pub issue: IssueRecord,
    pub reopen: ReopenEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_key_normalization() {
        assert_eq!(ProjectKey::parse(" abc ").unwrap().as_str(), "ABC");
        assert_eq!(ProjectKey::parse("WEB_2").unwrap().to_string(), "WEB_2");
    }

    #[test]
    fn test_project_key_rejects_invalid() {
        assert!(matches!(
            ProjectKey::parse("   "),
            Err(CoreError::InvalidProjectKey { .. })
        ));
        assert!(ProjectKey::parse("ABC OR project = X").is_err());
        assert!(ProjectKey::parse("A\"B").is_err());
    }

    #[test]
    fn test_status_change_field_is_case_insensitive() {
        let event = ChangeEvent {
            timestamp: Utc::now(),
            author: None,
            field: "Status".to_string(),
            from: Some("Done".to_string()),
            to: Some("Open".to_string()),
        };
        assert!(event.is_status_change());
    }

    #[test]
    fn test_reopen_actor_name_defaults_to_unknown() {
        let event = ReopenEvent {
            issue_key: "ABC-1".to_string(),
            timestamp: Utc::now(),
            from_status: "Done".to_string(),
            to_status: "Open".to_string(),
            actor: None,
        };
        assert_eq!(event.actor_name(), "Unknown");
    }
}
