//! Reopen detection over status histories
//!
//! An issue counts as reopened when a status change moves it from a
//! closure-adjacent ("mature") status back to an early-workflow status.
//! Both sides are matched by case-insensitive substrings, kept as data so
//! they can be tuned per tracker deployment.
//!
//! Only the first qualifying transition is reported; a second reopen of the
//! same issue is not counted separately. A status matching both sets is
//! tested against each side independently, with no precedence.

use crate::config::StatsConfig;
use crate::error::CoreError;
use crate::models::{IssueRecord, ReopenEvent};
use tracing::trace;

/// Case-insensitive substring sets for mature and early statuses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMatcher {
    mature: Vec<String>,
    early: Vec<String>,
}

impl StatusMatcher {
    pub fn new<M, E>(mature: M, early: E) -> Self
    where
        M: IntoIterator,
        M::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self {
            mature: lowercase_set(mature),
            early: lowercase_set(early),
        }
    }

    pub fn from_config(config: &StatsConfig) -> Self {
        Self::new(&config.mature_states, &config.early_states)
    }

    pub fn is_mature(&self, status: &str) -> bool {
        contains_any(status, &self.mature)
    }

    pub fn is_early(&self, status: &str) -> bool {
        contains_any(status, &self.early)
    }

    /// True for a mature → early transition
    pub fn is_reopen(&self, from: &str, to: &str) -> bool {
        self.is_mature(from) && self.is_early(to)
    }
}

impl Default for StatusMatcher {
    fn default() -> Self {
        Self::from_config(&StatsConfig::default())
    }
}

fn lowercase_set<I>(values: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

fn contains_any(status: &str, needles: &[String]) -> bool {
    let status = status.to_lowercase();
    needles.iter().any(|n| status.contains(n.as_str()))
}

/// Finds the first reopen in an issue's status history
#[derive(Debug, Clone, Default)]
pub struct ReopenDetector {
    matcher: StatusMatcher,
}

impl ReopenDetector {
    pub fn new(matcher: StatusMatcher) -> Self {
        Self { matcher }
    }

    pub fn from_config(config: &StatsConfig) -> Self {
        Self::new(StatusMatcher::from_config(config))
    }

    pub fn matcher(&self) -> &StatusMatcher {
        &self.matcher
    }

    /// Scan the status changes of `issue` in chronological order
    ///
    /// Returns `Ok(None)` when no mature → early transition exists and a
    /// classification error when the tracker's history could not be parsed.
    pub fn detect(&self, issue: &IssueRecord) -> Result<Option<ReopenEvent>, CoreError> {
        if let Some(reason) = &issue.history_error {
            return Err(CoreError::Classification {
                issue_key: issue.key.clone(),
                reason: reason.clone(),
            });
        }

        for change in issue.status_changes() {
            let from = change.from.as_deref().unwrap_or_default();
            let to = change.to.as_deref().unwrap_or_default();

            if self.matcher.is_reopen(from, to) {
                let event = ReopenEvent {
                    issue_key: issue.key.clone(),
                    timestamp: change.timestamp,
                    from_status: from.to_string(),
                    to_status: to.to_string(),
                    actor: change.author.clone(),
                };
                trace!(
                    issue = %issue.key,
                    from = %from,
                    to = %to,
                    actor = %event.actor_name(),
                    "Reopen detected"
                );
                return Ok(Some(event));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{ChangeEvent, Identity, ProjectKey};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    pub(crate) fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    pub(crate) fn status_change(minutes: i64, from: &str, to: &str, by: &str) -> ChangeEvent {
        ChangeEvent {
            timestamp: base_time() + Duration::minutes(minutes),
            author: Some(Identity::named(by)),
            field: "status".to_string(),
            from: Some(from.to_string()),
            to: Some(to.to_string()),
        }
    }

    pub(crate) fn issue(key: &str, issue_type: &str, changes: Vec<ChangeEvent>) -> IssueRecord {
        IssueRecord {
            key: key.to_string(),
            project: ProjectKey::parse(key.split('-').next().unwrap_or("ABC")).unwrap(),
            summary: format!("Summary of {}", key),
            status: "Open".to_string(),
            issue_type: issue_type.to_string(),
            priority: Some("Medium".to_string()),
            assignee: None,
            reporter: None,
            commenters: Vec::new(),
            created: base_time(),
            updated: base_time(),
            changes,
            history_error: None,
        }
    }

    #[test]
    fn test_review_to_todo_is_reopen() {
        let detector = ReopenDetector::default();
        let bug = issue(
            "ABC-1",
            "Bug",
            vec![
                status_change(0, "To Do", "In Progress", "Bob"),
                status_change(10, "In Progress", "In Review", "Bob"),
                status_change(20, "In Review", "To Do", "Alice"),
            ],
        );

        let event = detector.detect(&bug).unwrap().unwrap();
        assert_eq!(event.issue_key, "ABC-1");
        assert_eq!(event.from_status, "In Review");
        assert_eq!(event.to_status, "To Do");
        assert_eq!(event.actor_name(), "Alice");
        assert_eq!(event.timestamp, base_time() + Duration::minutes(20));
    }

    #[test]
    fn test_forward_only_history_is_not_reopen() {
        let detector = ReopenDetector::default();
        let bug = issue(
            "ABC-2",
            "Bug",
            vec![
                status_change(0, "To Do", "In Progress", "Bob"),
                status_change(5, "In Progress", "Done", "Bob"),
            ],
        );
        assert_eq!(detector.detect(&bug).unwrap(), None);
    }

    #[test]
    fn test_first_reopen_wins() {
        let detector = ReopenDetector::default();
        let bug = issue(
            "ABC-3",
            "Bug",
            vec![
                status_change(0, "Done", "Reopened", "Carol"),
                status_change(10, "Reopened", "Closed", "Bob"),
                status_change(20, "Closed", "Open", "Dave"),
            ],
        );

        let event = detector.detect(&bug).unwrap().unwrap();
        assert_eq!(event.actor_name(), "Carol");
        assert_eq!(event.to_status, "Reopened");
    }

    #[test]
    fn test_non_status_fields_ignored() {
        let detector = ReopenDetector::default();
        let mut change = status_change(0, "Done", "Open", "Alice");
        change.field = "resolution".to_string();
        let bug = issue("ABC-4", "Bug", vec![change]);
        assert_eq!(detector.detect(&bug).unwrap(), None);
    }

    #[test]
    fn test_matching_is_case_insensitive_substring() {
        let matcher = StatusMatcher::default();
        assert!(matcher.is_reopen("UNDER REVIEW", "backlog"));
        assert!(matcher.is_reopen("Resolved", "Selected for Development / To Do"));
        assert!(!matcher.is_reopen("In Progress", "To Do"));
        assert!(!matcher.is_reopen("Done", "Closed"));
    }

    #[test]
    fn test_custom_state_sets() {
        let detector = ReopenDetector::new(StatusMatcher::new(["verify"], ["rework"]));
        let bug = issue(
            "ABC-5",
            "Bug",
            vec![
                status_change(0, "Done", "Open", "Alice"),
                status_change(5, "Verify", "Rework", "Bob"),
            ],
        );
        let event = detector.detect(&bug).unwrap().unwrap();
        assert_eq!(event.actor_name(), "Bob");
    }

    #[test]
    fn test_missing_actor_and_values() {
        let detector = ReopenDetector::default();
        let mut change = status_change(0, "Closed", "Open", "x");
        change.author = None;
        let mut empty = status_change(1, "", "", "x");
        empty.from = None;
        empty.to = None;
        let bug = issue("ABC-6", "Bug", vec![empty, change]);

        let event = detector.detect(&bug).unwrap().unwrap();
        assert_eq!(event.actor, None);
        assert_eq!(event.actor_name(), "Unknown");
    }

    #[test]
    fn test_unparseable_history_is_classification_error() {
        let detector = ReopenDetector::default();
        let mut bug = issue("ABC-7", "Bug", Vec::new());
        bug.history_error = Some("history 0 has no timestamp".to_string());

        match detector.detect(&bug) {
            Err(CoreError::Classification { issue_key, .. }) => assert_eq!(issue_key, "ABC-7"),
            other => panic!("expected classification error, got {:?}", other),
        }
    }
}
