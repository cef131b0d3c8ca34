//! Statistics result model
//!
//! `StatisticsResult` is the unit stored in and served from the cache.
//! It keeps a compact per-issue digest so participant views can be derived
//! in memory without another source query.

use super::identity::{Identity, IdentityKey};
use super::issue::{IssueRecord, ReopenEvent};
use crate::error::DegradationReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Activity of one participant in a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantActivity {
    pub identity: Identity,
    pub assigned_count: u64,
    pub reported_count: u64,
    pub commented_count: u64,
}

impl ParticipantActivity {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            assigned_count: 0,
            reported_count: 0,
            commented_count: 0,
        }
    }

    /// Number of issues touched in any role
    pub fn total(&self) -> u64 {
        self.assigned_count + self.reported_count + self.commented_count
    }
}

/// Row of the recent-issues list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentIssue {
    pub key: String,
    pub summary: String,
    pub status: String,
    pub issue_type: String,
    pub assignee: Option<String>,
    pub updated: DateTime<Utc>,
}

/// Reopen count for one actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReopenerCount {
    pub name: String,
    pub count: u64,
}

/// Bug tally for one assignee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssigneeBugStat {
    pub key: IdentityKey,
    pub assignee: Identity,
    pub total: u64,
    pub reopened: u64,
}

/// Outcome of reopen classification for one issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReopenStatus {
    /// Not a bug; reopen detection does not apply
    NotApplicable,
    NotReopened,
    Reopened(ReopenEvent),
    /// History could not be classified; excluded from bug tallies
    Unclassifiable { reason: String },
}

impl ReopenStatus {
    pub fn event(&self) -> Option<&ReopenEvent> {
        match self {
            ReopenStatus::Reopened(event) => Some(event),
            _ => None,
        }
    }
}

/// The per-issue facts a statistics result is computed from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueDigest {
    pub key: String,
    pub summary: String,
    pub status: String,
    pub issue_type: String,
    pub assignee: Option<Identity>,
    pub reporter: Option<Identity>,
    pub commenters: Vec<Identity>,
    pub updated: DateTime<Utc>,
    pub reopen: ReopenStatus,
}

impl IssueDigest {
    pub fn new(issue: &IssueRecord, reopen: ReopenStatus) -> Self {
        Self {
            key: issue.key.clone(),
            summary: issue.summary.clone(),
            status: issue.status.clone(),
            issue_type: issue.issue_type.clone(),
            assignee: issue.assignee.clone(),
            reporter: issue.reporter.clone(),
            commenters: issue.commenters.clone(),
            updated: issue.updated,
            reopen,
        }
    }

    /// True if the participant is assignee, reporter or a comment author
    pub fn involves(&self, participant: &str) -> bool {
        self.assignee.iter().any(|a| a.matches(participant))
            || self.reporter.iter().any(|r| r.matches(participant))
            || self.commenters.iter().any(|c| c.matches(participant))
    }
}

/// Aggregate statistics for one project, date window and participant scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsResult {
    pub total_issues: u64,
    pub status_counts: BTreeMap<String, u64>,
    pub issue_types: BTreeMap<String, u64>,
    pub completed_count: u64,
    pub bugs_count: u64,
    pub reopened_bugs_count: u64,
    /// Most recently updated first
    pub recent_issues: Vec<RecentIssue>,
    pub participants: Vec<ParticipantActivity>,
    pub total_participants: u64,
    /// Sorted by count descending, then name
    pub reopeners: Vec<ReopenerCount>,
    /// Sorted by total descending, then display name
    pub assignee_bug_stats: Vec<AssigneeBugStat>,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "DegradationReport::is_healthy")]
    pub degraded: DegradationReport,
    #[serde(skip)]
    pub(crate) digests: Vec<IssueDigest>,
}

impl StatisticsResult {
    /// Zero-valued result
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            total_issues: 0,
            status_counts: BTreeMap::new(),
            issue_types: BTreeMap::new(),
            completed_count: 0,
            bugs_count: 0,
            reopened_bugs_count: 0,
            recent_issues: Vec::new(),
            participants: Vec::new(),
            total_participants: 0,
            reopeners: Vec::new(),
            assignee_bug_stats: Vec::new(),
            generated_at,
            degraded: DegradationReport::new(),
            digests: Vec::new(),
        }
    }

    /// Per-issue facts backing this result
    pub fn digests(&self) -> &[IssueDigest] {
        &self.digests
    }

    pub fn is_empty(&self) -> bool {
        self.total_issues == 0
    }
}

/// Occurrences of one `from -> to` status transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionCount {
    pub from: String,
    pub to: String,
    pub count: u64,
}

impl TransitionCount {
    pub fn label(&self) -> String {
        format!("{} → {}", self.from, self.to)
    }
}

/// Status transitions observed across a project's bugs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionReport {
    pub bugs_examined: u64,
    pub transitions: Vec<TransitionCount>,
    /// Subset of `transitions` the reopen detector treats as reopens
    pub reopen_candidates: Vec<TransitionCount>,
}
