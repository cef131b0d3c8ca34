//! Status transition census
//!
//! Lists every status transition seen in a set of issues and marks which
//! ones the reopen matcher would count, to help tune the state sets for a
//! particular workflow.

use super::reopen::StatusMatcher;
use crate::models::{IssueRecord, TransitionCount, TransitionReport};
use std::collections::HashMap;

/// Placeholder for a missing side of a transition
const UNKNOWN_STATUS: &str = "(unknown)";

/// Count transitions across the `limit` most recently updated issues
pub fn transition_report(
    issues: &[IssueRecord],
    matcher: &StatusMatcher,
    limit: usize,
) -> TransitionReport {
    let mut recent: Vec<&IssueRecord> = issues.iter().collect();
    recent.sort_by(|a, b| b.updated.cmp(&a.updated).then_with(|| a.key.cmp(&b.key)));
    recent.truncate(limit);

    let mut counts: HashMap<(String, String), u64> = HashMap::new();
    for issue in &recent {
        for change in issue.status_changes() {
            let from = change.from.as_deref().unwrap_or(UNKNOWN_STATUS).to_string();
            let to = change.to.as_deref().unwrap_or(UNKNOWN_STATUS).to_string();
            *counts.entry((from, to)).or_insert(0) += 1;
        }
    }

    let mut transitions: Vec<_> = counts
        .into_iter()
        .map(|((from, to), count)| TransitionCount { from, to, count })
        .collect();
    transitions.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.from.cmp(&b.from))
            .then_with(|| a.to.cmp(&b.to))
    });

    let reopen_candidates = transitions
        .iter()
        .filter(|t| matcher.is_reopen(&t.from, &t.to))
        .cloned()
        .collect();

    TransitionReport {
        bugs_examined: recent.len() as u64,
        transitions,
        reopen_candidates,
    }
}
