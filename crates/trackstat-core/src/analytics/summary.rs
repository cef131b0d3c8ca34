//! Statistics assembly from classified issue digests
//!
//! Both the full aggregation and the participant view go through
//! [`summarize`], so a filtered view derived from cached base statistics is
//! identical to one computed from scratch.

use super::collector::{merge, sorted_stats, AssigneeTally};
use crate::config::StatsConfig;
use crate::error::DegradationReport;
use crate::models::{
    IssueDigest, ParticipantActivity, RecentIssue, ReopenerCount, StatisticsResult,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// Settings that shape a summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOptions {
    pub bug_type: String,
    pub recent_issue_limit: usize,
    pub completed_states: Vec<String>,
}

impl SummaryOptions {
    pub fn from_config(config: &StatsConfig) -> Self {
        Self {
            bug_type: config.bug_type.clone(),
            recent_issue_limit: config.recent_issue_limit,
            completed_states: config.completed_states.clone(),
        }
    }

    fn is_completed(&self, status: &str) -> bool {
        self.completed_states
            .iter()
            .any(|s| s.trim().eq_ignore_ascii_case(status.trim()))
    }
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self::from_config(&StatsConfig::default())
    }
}

/// Inputs shared by every view of one aggregation run
#[derive(Debug, Clone)]
pub struct SummaryContext<'a> {
    pub participants: &'a [ParticipantActivity],
    pub generated_at: DateTime<Utc>,
    pub degraded: &'a DegradationReport,
}

/// Build a statistics result from classified digests
pub fn summarize(
    digests: Vec<IssueDigest>,
    context: SummaryContext<'_>,
    options: &SummaryOptions,
) -> StatisticsResult {
    let mut status_counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut issue_types: BTreeMap<String, u64> = BTreeMap::new();
    let mut reopeners: HashMap<String, u64> = HashMap::new();
    let mut tally = AssigneeTally::new();
    let mut completed_count = 0;
    let mut bugs_count = 0;
    let mut reopened_bugs_count = 0;

    for digest in &digests {
        *status_counts.entry(digest.status.clone()).or_insert(0) += 1;
        *issue_types.entry(digest.issue_type.clone()).or_insert(0) += 1;

        if options.is_completed(&digest.status) {
            completed_count += 1;
        }

        if digest.issue_type.eq_ignore_ascii_case(&options.bug_type) {
            bugs_count += 1;
        }

        if let Some(event) = digest.reopen.event() {
            reopened_bugs_count += 1;
            *reopeners.entry(event.actor_name().to_string()).or_insert(0) += 1;
        }

        merge(&mut tally, digest.assignee.as_ref(), &digest.reopen);
    }

    StatisticsResult {
        total_issues: digests.len() as u64,
        status_counts,
        issue_types,
        completed_count,
        bugs_count,
        reopened_bugs_count,
        recent_issues: recent_issues(&digests, options.recent_issue_limit),
        participants: context.participants.to_vec(),
        total_participants: context.participants.len() as u64,
        reopeners: sorted_reopeners(reopeners),
        assignee_bug_stats: sorted_stats(tally),
        generated_at: context.generated_at,
        degraded: context.degraded.clone(),
        digests,
    }
}

/// Most recently updated first, ties by key, capped at `limit`
fn recent_issues(digests: &[IssueDigest], limit: usize) -> Vec<RecentIssue> {
    let mut recent: Vec<_> = digests
        .iter()
        .map(|d| RecentIssue {
            key: d.key.clone(),
            summary: d.summary.clone(),
            status: d.status.clone(),
            issue_type: d.issue_type.clone(),
            assignee: d.assignee.as_ref().map(|a| a.display_name.clone()),
            updated: d.updated,
        })
        .collect();

    recent.sort_by(|a, b| b.updated.cmp(&a.updated).then_with(|| a.key.cmp(&b.key)));
    recent.truncate(limit);
    recent
}

/// Count descending, ties by name
fn sorted_reopeners(reopeners: HashMap<String, u64>) -> Vec<ReopenerCount> {
    let mut sorted: Vec<_> = reopeners
        .into_iter()
        .map(|(name, count)| ReopenerCount { name, count })
        .collect();
    sorted.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Identity, ReopenEvent, ReopenStatus};
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn digest(key: &str, status: &str, issue_type: &str, reopen: ReopenStatus) -> IssueDigest {
        IssueDigest {
            key: key.to_string(),
            summary: key.to_lowercase(),
            status: status.to_string(),
            issue_type: issue_type.to_string(),
            assignee: Some(Identity::named("Dev")),
            reporter: None,
            commenters: Vec::new(),
            updated: at(0),
            reopen,
        }
    }

    fn reopened_by(key: &str, actor: &str) -> ReopenStatus {
        ReopenStatus::Reopened(ReopenEvent {
            issue_key: key.to_string(),
            timestamp: at(0),
            from_status: "Done".to_string(),
            to_status: "Open".to_string(),
            actor: Some(Identity::named(actor)),
        })
    }

    fn context(report: &DegradationReport) -> SummaryContext<'_> {
        SummaryContext {
            participants: &[],
            generated_at: at(0),
            degraded: report,
        }
    }

    #[test]
    fn test_counts_sum_to_total() {
        let report = DegradationReport::new();
        let digests = vec![
            digest("A-1", "Open", "Bug", ReopenStatus::NotReopened),
            digest("A-2", "Done", "Task", ReopenStatus::NotApplicable),
            digest("A-3", "Done", "Bug", reopened_by("A-3", "Zed")),
            digest("A-4", "Closed", "Story", ReopenStatus::NotApplicable),
        ];
        let result = summarize(digests, context(&report), &SummaryOptions::default());

        assert_eq!(result.total_issues, 4);
        assert_eq!(result.status_counts.values().sum::<u64>(), 4);
        assert_eq!(result.issue_types.values().sum::<u64>(), 4);
        assert_eq!(result.completed_count, 3);
        assert_eq!(result.bugs_count, 2);
        assert_eq!(result.reopened_bugs_count, 1);
    }

    #[test]
    fn test_unclassifiable_bug_counted_in_totals_only() {
        let report = DegradationReport::new();
        let digests = vec![
            digest(
                "A-1",
                "Open",
                "Bug",
                ReopenStatus::Unclassifiable {
                    reason: "bad history".to_string(),
                },
            ),
            digest("A-2", "Open", "Bug", ReopenStatus::NotReopened),
        ];
        let result = summarize(digests, context(&report), &SummaryOptions::default());

        assert_eq!(result.bugs_count, 2);
        assert_eq!(result.assignee_bug_stats.len(), 1);
        assert_eq!(result.assignee_bug_stats[0].total, 1);
    }

    #[test]
    fn test_reopeners_sorted_by_count_then_name() {
        let report = DegradationReport::new();
        let digests = vec![
            digest("A-1", "Open", "Bug", reopened_by("A-1", "Yan")),
            digest("A-2", "Open", "Bug", reopened_by("A-2", "Bea")),
            digest("A-3", "Open", "Bug", reopened_by("A-3", "Yan")),
            digest("A-4", "Open", "Bug", reopened_by("A-4", "Abe")),
        ];
        let result = summarize(digests, context(&report), &SummaryOptions::default());

        let reopeners: Vec<_> = result
            .reopeners
            .iter()
            .map(|r| (r.name.as_str(), r.count))
            .collect();
        assert_eq!(reopeners, vec![("Yan", 2), ("Abe", 1), ("Bea", 1)]);
    }

    #[test]
    fn test_recent_issues_sorted_and_capped() {
        let report = DegradationReport::new();
        let digests: Vec<_> = (0..60)
            .map(|i| {
                let mut d = digest(
                    &format!("A-{}", i),
                    "Open",
                    "Task",
                    ReopenStatus::NotApplicable,
                );
                d.updated = at(i);
                d
            })
            .collect();
        let result = summarize(digests, context(&report), &SummaryOptions::default());

        assert_eq!(result.recent_issues.len(), 50);
        assert_eq!(result.recent_issues[0].key, "A-59");
        assert_eq!(result.recent_issues[49].key, "A-10");
        assert_eq!(result.total_issues, 60);
    }

    #[test]
    fn test_recent_issue_ties_ordered_by_key() {
        let report = DegradationReport::new();
        let digests = vec![
            digest("A-2", "Open", "Task", ReopenStatus::NotApplicable),
            digest("A-1", "Open", "Task", ReopenStatus::NotApplicable),
        ];
        let result = summarize(digests, context(&report), &SummaryOptions::default());
        assert_eq!(result.recent_issues[0].key, "A-1");
        assert_eq!(result.recent_issues[0].assignee.as_deref(), Some("Dev"));
    }
}
