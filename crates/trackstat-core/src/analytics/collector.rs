//! Per-assignee bug tallies
//!
//! Classification fans out over a bounded pool of blocking workers. Each
//! worker classifies a contiguous slice of the batch and sends its partial
//! results over a channel; a single reducer owns the tally map, so no lock
//! is shared between workers. Merging is commutative, so completion order
//! never changes the final counts.
//!
//! [`AssigneeBugCollector::collect`] reduces straight into a tally. The
//! aggregator calls [`AssigneeBugCollector::classify_all`] instead, because
//! cached results keep one digest per issue for participant views; the
//! tally is then folded from those digests by [`summarize`](super::summarize)
//! with the same [`merge`] rule, so both paths agree.

use super::reopen::ReopenDetector;
use crate::config::StatsConfig;
use crate::models::{AssigneeBugStat, Identity, IdentityKey, IssueRecord, ReopenStatus};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Reopen classification of one issue in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueClassification {
    /// Position in the input batch
    pub index: usize,
    pub reopen: ReopenStatus,
}

/// Tally map keyed by assignee identity
pub type AssigneeTally = HashMap<IdentityKey, AssigneeBugStat>;

/// Classifies issue batches and tallies bugs per assignee
#[derive(Debug, Clone)]
pub struct AssigneeBugCollector {
    detector: Arc<ReopenDetector>,
    bug_type: String,
    max_workers: usize,
    sequential_threshold: usize,
}

impl AssigneeBugCollector {
    pub fn new(detector: ReopenDetector, config: &StatsConfig) -> Self {
        Self {
            detector: Arc::new(detector),
            bug_type: config.bug_type.clone(),
            max_workers: config.max_workers.max(1),
            sequential_threshold: config.sequential_threshold,
        }
    }

    pub fn from_config(config: &StatsConfig) -> Self {
        Self::new(ReopenDetector::from_config(config), config)
    }

    pub fn detector(&self) -> &ReopenDetector {
        &self.detector
    }

    /// Classify one issue; non-bugs are not checked for reopens
    pub fn classify_one(&self, issue: &IssueRecord) -> ReopenStatus {
        classify_issue(&self.detector, &self.bug_type, issue)
    }

    /// Number of workers for a batch of `len` issues
    ///
    /// A hint of 0 or 1, or a batch below the sequential threshold, runs inline.
    pub fn worker_count(&self, len: usize, concurrency_hint: usize) -> usize {
        if concurrency_hint <= 1 || len < self.sequential_threshold.max(2) {
            return 1;
        }
        concurrency_hint.min(self.max_workers).min(len)
    }

    /// Classify every issue, returning results in input order
    pub async fn classify_all(
        &self,
        issues: Arc<[IssueRecord]>,
        concurrency_hint: usize,
    ) -> Vec<ReopenStatus> {
        let workers = self.worker_count(issues.len(), concurrency_hint);
        if workers == 1 {
            return issues.iter().map(|i| self.classify_one(i)).collect();
        }

        let mut slots: Vec<Option<ReopenStatus>> = vec![None; issues.len()];
        let (mut rx, handles) = self.fan_out(Arc::clone(&issues), workers);

        while let Some(batch) = rx.recv().await {
            for classification in batch {
                slots[classification.index] = Some(classification.reopen);
            }
        }
        join_workers(handles).await;

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    warn!(issue = %issues[index].key, "Issue lost by a failed worker");
                    ReopenStatus::Unclassifiable {
                        reason: "classification worker failed".to_string(),
                    }
                })
            })
            .collect()
    }

    /// Tally total and reopened bugs per assignee
    pub async fn collect(
        &self,
        issues: Arc<[IssueRecord]>,
        concurrency_hint: usize,
    ) -> AssigneeTally {
        let mut tally = AssigneeTally::new();
        let workers = self.worker_count(issues.len(), concurrency_hint);

        if workers == 1 {
            for issue in issues.iter() {
                merge(&mut tally, issue.assignee.as_ref(), &self.classify_one(issue));
            }
            return tally;
        }

        let (mut rx, handles) = self.fan_out(Arc::clone(&issues), workers);
        while let Some(batch) = rx.recv().await {
            for classification in batch {
                let assignee = issues[classification.index].assignee.as_ref();
                merge(&mut tally, assignee, &classification.reopen);
            }
        }
        join_workers(handles).await;

        debug!(
            issues = issues.len(),
            workers,
            assignees = tally.len(),
            "Assignee bug tally collected"
        );
        tally
    }

    /// Spawn one blocking worker per contiguous slice of the batch
    fn fan_out(
        &self,
        issues: Arc<[IssueRecord]>,
        workers: usize,
    ) -> (
        mpsc::Receiver<Vec<IssueClassification>>,
        Vec<JoinHandle<()>>,
    ) {
        let (tx, rx) = mpsc::channel(workers);
        let handles = partition(issues.len(), workers)
            .into_iter()
            .map(|range| {
                let tx = tx.clone();
                let issues = Arc::clone(&issues);
                let detector = Arc::clone(&self.detector);
                let bug_type = self.bug_type.clone();

                tokio::task::spawn_blocking(move || {
                    let batch: Vec<_> = range
                        .map(|index| IssueClassification {
                            index,
                            reopen: classify_issue(&detector, &bug_type, &issues[index]),
                        })
                        .collect();
                    // Receiver only drops if the reducer was cancelled
                    let _ = tx.blocking_send(batch);
                })
            })
            .collect();

        (rx, handles)
    }
}

fn classify_issue(detector: &ReopenDetector, bug_type: &str, issue: &IssueRecord) -> ReopenStatus {
    if !issue.is_type(bug_type) {
        return ReopenStatus::NotApplicable;
    }
    match detector.detect(issue) {
        Ok(Some(event)) => ReopenStatus::Reopened(event),
        Ok(None) => ReopenStatus::NotReopened,
        Err(e) => ReopenStatus::Unclassifiable {
            reason: e.to_string(),
        },
    }
}

async fn join_workers(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Classification worker panicked");
        }
    }
}

/// Split `0..len` into at most `parts` contiguous, near-equal ranges
fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.clamp(1, len.max(1));
    let chunk = len.div_ceil(parts).max(1);
    (0..len)
        .step_by(chunk)
        .map(|start| start..(start + chunk).min(len))
        .collect()
}

/// Fold one classified issue into the tally
///
/// Only classified bugs count: a new assignee starts at total 1, an existing
/// one is incremented, and a detected reopen also increments `reopened`.
pub fn merge(tally: &mut AssigneeTally, assignee: Option<&Identity>, reopen: &ReopenStatus) {
    let reopened = match reopen {
        ReopenStatus::NotReopened => false,
        ReopenStatus::Reopened(_) => true,
        ReopenStatus::NotApplicable | ReopenStatus::Unclassifiable { .. } => return,
    };

    let unassigned = Identity::unassigned();
    let assignee = assignee.unwrap_or(&unassigned);
    let key = assignee.identity_key();

    match tally.get_mut(&key) {
        Some(stat) => {
            stat.total += 1;
            if reopened {
                stat.reopened += 1;
            }
            if stat.assignee.canonical(assignee) != &stat.assignee {
                stat.assignee = assignee.clone();
            }
        }
        None => {
            tally.insert(
                key.clone(),
                AssigneeBugStat {
                    key,
                    assignee: assignee.clone(),
                    total: 1,
                    reopened: u64::from(reopened),
                },
            );
        }
    }
}

/// Tally into a list sorted by total descending
///
/// Ties are ordered alphabetically by display name (case-insensitive), then
/// by identity key.
pub fn sorted_stats(tally: AssigneeTally) -> Vec<AssigneeBugStat> {
    let mut stats: Vec<_> = tally.into_values().collect();
    stats.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| {
                a.assignee
                    .display_name
                    .to_lowercase()
                    .cmp(&b.assignee.display_name.to_lowercase())
            })
            .then_with(|| a.key.cmp(&b.key))
    });
    stats
}
