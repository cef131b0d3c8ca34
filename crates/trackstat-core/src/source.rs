//! Issue and participant sources
//!
//! The aggregator only sees these traits. Implementations here cover an
//! in-memory batch, a Jira JSON export on disk, and participants derived
//! from issue roles.

use crate::error::{CoreError, DegradationReport};
use crate::models::{Identity, IdentityKey, IssueRecord, ParticipantActivity, ProjectKey};
use crate::parsers::jira;
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Issues wanted from a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueQuery {
    pub project: ProjectKey,
    /// Inclusive lower bound on the update date
    pub updated_after: Option<NaiveDate>,
    /// Inclusive upper bound on the update date
    pub updated_before: Option<NaiveDate>,
}

impl IssueQuery {
    /// All issues of a project
    pub fn project(project: ProjectKey) -> Self {
        Self {
            project,
            updated_after: None,
            updated_before: None,
        }
    }

    pub fn with_window(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.updated_after = start;
        self.updated_before = end;
        self
    }

    pub fn matches(&self, issue: &IssueRecord) -> bool {
        let day = issue.updated.date_naive();
        issue.project == self.project
            && self.updated_after.map_or(true, |start| day >= start)
            && self.updated_before.map_or(true, |end| day <= end)
    }
}

/// Issues returned by a search, plus the records the source had to skip
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub issues: Vec<IssueRecord>,
    /// Per-record failures; the search itself succeeded
    pub rejected: Vec<CoreError>,
}

impl SearchOutcome {
    pub fn complete(issues: Vec<IssueRecord>) -> Self {
        Self {
            issues,
            rejected: Vec::new(),
        }
    }

    /// Rejected records as warnings attributed to `source`
    pub fn rejections(&self, source: &str) -> DegradationReport {
        let mut report = DegradationReport::new();
        for error in &self.rejected {
            report.record(source, error);
        }
        report
    }
}

/// Anything that can list issues of a project
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// Name used in logs and degradation entries
    fn name(&self) -> &str;

    async fn search(&self, query: &IssueQuery) -> Result<SearchOutcome, CoreError>;
}

/// Anything that can list the people active in a project
#[async_trait]
pub trait ParticipantSource: Send + Sync {
    fn name(&self) -> &str;

    async fn list_participants(
        &self,
        project: &ProjectKey,
    ) -> Result<Vec<ParticipantActivity>, CoreError>;
}

// ===================
// In-memory
// ===================

/// Fixed batch of issues, replaceable at runtime
#[derive(Debug, Default)]
pub struct StaticIssueSource {
    issues: RwLock<Vec<IssueRecord>>,
}

impl StaticIssueSource {
    pub fn new(issues: Vec<IssueRecord>) -> Self {
        Self {
            issues: RwLock::new(issues),
        }
    }

    /// Swap the batch; cached results are unaffected until they expire
    pub fn replace(&self, issues: Vec<IssueRecord>) {
        *self.issues.write() = issues;
    }

    pub fn len(&self) -> usize {
        self.issues.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IssueSource for StaticIssueSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, query: &IssueQuery) -> Result<SearchOutcome, CoreError> {
        Ok(SearchOutcome::complete(
            self.issues
                .read()
                .iter()
                .filter(|issue| query.matches(issue))
                .cloned()
                .collect(),
        ))
    }
}

// ===================
// JSON export
// ===================

/// Jira JSON export read from disk on every search
#[derive(Debug, Clone)]
pub struct JsonIssueSource {
    path: PathBuf,
}

impl JsonIssueSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl IssueSource for JsonIssueSource {
    fn name(&self) -> &str {
        "json-export"
    }

    async fn search(&self, query: &IssueQuery) -> Result<SearchOutcome, CoreError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| CoreError::SourceRead {
                path: self.path.clone(),
                source: e,
            })?;

        let parsed = jira::parse_export(&content, &self.path)?;
        if !parsed.rejected.is_empty() {
            warn!(
                path = %self.path.display(),
                rejected = parsed.rejected.len(),
                "Export contains malformed issues"
            );
        }

        let issues: Vec<_> = parsed
            .issues
            .into_iter()
            .filter(|issue| query.matches(issue))
            .collect();
        debug!(project = %query.project, matched = issues.len(), "Export searched");
        Ok(SearchOutcome {
            issues,
            rejected: parsed.rejected,
        })
    }
}

// ===================
// Derived participants
// ===================

/// Participants counted from issue roles of a project's issues
pub struct DerivedParticipantSource {
    issues: Arc<dyn IssueSource>,
}

impl DerivedParticipantSource {
    pub fn new(issues: Arc<dyn IssueSource>) -> Self {
        Self { issues }
    }
}

#[async_trait]
impl ParticipantSource for DerivedParticipantSource {
    fn name(&self) -> &str {
        "derived-participants"
    }

    async fn list_participants(
        &self,
        project: &ProjectKey,
    ) -> Result<Vec<ParticipantActivity>, CoreError> {
        let found = self
            .issues
            .search(&IssueQuery::project(project.clone()))
            .await?;
        Ok(participants_of(&found.issues))
    }
}

/// Per-identity role counts, busiest first
pub fn participants_of(issues: &[IssueRecord]) -> Vec<ParticipantActivity> {
    let mut by_key: HashMap<IdentityKey, ParticipantActivity> = HashMap::new();

    for issue in issues {
        if let Some(assignee) = &issue.assignee {
            slot(&mut by_key, assignee).assigned_count += 1;
        }
        if let Some(reporter) = &issue.reporter {
            slot(&mut by_key, reporter).reported_count += 1;
        }
        for commenter in &issue.commenters {
            slot(&mut by_key, commenter).commented_count += 1;
        }
    }

    let mut participants: Vec<_> = by_key.into_values().collect();
    participants.sort_by(|a, b| {
        b.total()
            .cmp(&a.total())
            .then_with(|| {
                a.identity
                    .display_name
                    .to_lowercase()
                    .cmp(&b.identity.display_name.to_lowercase())
            })
            .then_with(|| a.identity.identity_key().cmp(&b.identity.identity_key()))
    });
    participants
}

fn slot<'a>(
    by_key: &'a mut HashMap<IdentityKey, ParticipantActivity>,
    identity: &Identity,
) -> &'a mut ParticipantActivity {
    let activity = by_key
        .entry(identity.identity_key())
        .or_insert_with(|| ParticipantActivity::new(identity.clone()));
    activity.identity = activity.identity.canonical(identity).clone();
    activity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::reopen::tests::issue;
    use chrono::{Duration, TimeZone, Utc};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn project(key: &str) -> ProjectKey {
        ProjectKey::parse(key).unwrap()
    }

    #[test]
    fn test_query_window_is_inclusive() {
        let mut record = issue("ABC-1", "Bug", Vec::new());
        record.updated = Utc.with_ymd_and_hms(2024, 5, 10, 23, 59, 0).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();

        let query = IssueQuery::project(project("ABC")).with_window(Some(day), Some(day));
        assert!(query.matches(&record));

        let later = IssueQuery::project(project("ABC")).with_window(day.succ_opt(), None);
        assert!(!later.matches(&record));

        assert!(!IssueQuery::project(project("XYZ")).matches(&record));
    }

    #[tokio::test]
    async fn test_static_source_filters_and_replaces() {
        let mut old = issue("ABC-1", "Bug", Vec::new());
        old.updated = old.updated - Duration::days(30);
        let source = StaticIssueSource::new(vec![old, issue("ABC-2", "Bug", Vec::new())]);

        let cutoff = issue("X-1", "Bug", Vec::new()).updated.date_naive() - Duration::days(1);
        let query = IssueQuery::project(project("abc")).with_window(Some(cutoff), None);
        let found = source.search(&query).await.unwrap();
        assert_eq!(found.issues.len(), 1);
        assert_eq!(found.issues[0].key, "ABC-2");
        assert!(found.rejected.is_empty());

        source.replace(Vec::new());
        assert!(source.is_empty());
    }

    #[tokio::test]
    async fn test_json_source_reads_export() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"issues": [
                {{"key": "ABC-1", "fields": {{"issuetype": {{"name": "Bug"}}, "updated": "2024-01-02T00:00:00.000+0000"}}}},
                {{"key": "XYZ-1", "fields": {{}}}},
                {{"fields": {{}}}}
            ]}}"#
        )
        .unwrap();

        let source = JsonIssueSource::new(file.path());
        let found = source
            .search(&IssueQuery::project(project("ABC")))
            .await
            .unwrap();
        assert_eq!(found.issues.len(), 1);
        assert_eq!(found.issues[0].issue_type, "Bug");
        assert_eq!(found.rejected.len(), 1);

        let report = found.rejections(source.name());
        assert_eq!(report.counts(), (1, 0));
        assert_eq!(report.entries[0].source, "json-export");
    }

    #[tokio::test]
    async fn test_json_source_missing_file() {
        let source = JsonIssueSource::new("/nonexistent/export.json");
        let result = source.search(&IssueQuery::project(project("ABC"))).await;
        assert!(matches!(result, Err(CoreError::SourceRead { .. })));
    }

    #[tokio::test]
    async fn test_derived_participants_counted_by_role() {
        let alice = Identity::with_account("acc-a", "Alice");
        let mut first = issue("ABC-1", "Bug", Vec::new());
        first.assignee = Some(alice.clone());
        first.reporter = Some(Identity::named("Bob"));
        first.commenters = vec![Identity::named("bob"), alice.clone()];
        let mut second = issue("ABC-2", "Task", Vec::new());
        second.assignee = Some(alice);

        let source: Arc<dyn IssueSource> = Arc::new(StaticIssueSource::new(vec![first, second]));
        let participants = DerivedParticipantSource::new(source)
            .list_participants(&project("ABC"))
            .await
            .unwrap();

        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0].identity.display_name, "Alice");
        assert_eq!(participants[0].assigned_count, 2);
        assert_eq!(participants[0].commented_count, 1);
        assert_eq!(participants[1].reported_count, 1);
        assert_eq!(participants[1].commented_count, 1);
        // "Bob" < "bob" in byte order, so the capitalised record is kept
        assert_eq!(participants[1].identity.display_name, "Bob");
    }
}
