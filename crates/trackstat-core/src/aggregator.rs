//! Statistics aggregator
//!
//! Owns the caches and the classification pipeline. Sources are consulted
//! only on a cache miss; concurrent misses for the same project and window
//! wait on a per-key gate held in a DashMap so the issue source is queried
//! once.

use crate::analytics::{
    summarize, transition_report, AssigneeBugCollector, ParticipantFilter, SummaryContext,
    SummaryOptions,
};
use crate::cache::{CacheKey, CacheStore};
use crate::config::StatsConfig;
use crate::error::{CoreError, DegradationReport};
use crate::models::{
    IssueDigest, IssueRecord, ProjectKey, ReopenStatus, ReopenedBug, StatisticsResult,
    TransitionReport,
};
use crate::source::{DerivedParticipantSource, IssueQuery, IssueSource, ParticipantSource};
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Degradation source label for the issue fetch
const ISSUES: &str = "issues";

/// Degradation source label for the participant fetch
const PARTICIPANTS: &str = "participants";

/// Parameters of a statistics request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsQuery {
    /// Raw project key, validated on use
    pub project: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub participant: Option<String>,
    pub use_concurrency: bool,
}

impl StatisticsQuery {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            start: None,
            end: None,
            participant: None,
            use_concurrency: true,
        }
    }

    /// Inclusive bounds on the last-updated date
    pub fn window(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn participant(mut self, participant: impl Into<String>) -> Self {
        self.participant = Some(participant.into());
        self
    }

    /// Classify on the calling task instead of the worker pool
    pub fn sequential(mut self) -> Self {
        self.use_concurrency = false;
        self
    }
}

/// A query that passed validation
struct Resolved {
    project: ProjectKey,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    participant: Option<String>,
}

impl StatisticsQuery {
    fn resolve(&self) -> Result<Resolved, CoreError> {
        let project = ProjectKey::parse(&self.project)?;
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(CoreError::InvalidDateRange { start, end });
            }
        }
        let participant = self
            .participant
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Ok(Resolved {
            project,
            start: self.start,
            end: self.end,
            participant,
        })
    }
}

/// Produces project statistics and reopened-bug lists
pub struct StatisticsAggregator {
    issues: Arc<dyn IssueSource>,
    participants: Arc<dyn ParticipantSource>,
    config: StatsConfig,
    collector: AssigneeBugCollector,
    filter: ParticipantFilter,
    summary: SummaryOptions,
    stats_cache: CacheStore<Arc<StatisticsResult>>,
    reopened_cache: CacheStore<Arc<Vec<ReopenedBug>>>,
    /// Per base-key gates for in-flight computations
    inflight: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl StatisticsAggregator {
    pub fn new(
        issues: Arc<dyn IssueSource>,
        participants: Arc<dyn ParticipantSource>,
        config: StatsConfig,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let summary = SummaryOptions::from_config(&config);

        Ok(Self {
            issues,
            participants,
            collector: AssigneeBugCollector::from_config(&config),
            filter: ParticipantFilter::new(summary.clone()),
            summary,
            config,
            stats_cache: CacheStore::new(),
            reopened_cache: CacheStore::new(),
            inflight: DashMap::new(),
        })
    }

    /// Aggregator whose participants are derived from the issue source
    pub fn with_derived_participants(
        issues: Arc<dyn IssueSource>,
        config: StatsConfig,
    ) -> Result<Self, CoreError> {
        let participants = Arc::new(DerivedParticipantSource::new(Arc::clone(&issues)));
        Self::new(issues, participants, config)
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    pub fn stats_cache(&self) -> &CacheStore<Arc<StatisticsResult>> {
        &self.stats_cache
    }

    pub fn reopened_cache(&self) -> &CacheStore<Arc<Vec<ReopenedBug>>> {
        &self.reopened_cache
    }

    /// Statistics for one project, optional window and optional participant
    ///
    /// Only invalid input is returned as an error. Source failures yield a
    /// degraded result with the failure recorded in `degraded`.
    pub async fn get_project_statistics(
        &self,
        query: &StatisticsQuery,
    ) -> Result<Arc<StatisticsResult>, CoreError> {
        let resolved = query.resolve()?;
        let key = CacheKey::statistics(
            &resolved.project,
            resolved.start,
            resolved.end,
            resolved.participant.as_deref(),
        );

        if let Some(hit) = self.stats_cache.get(&key) {
            debug!(key = %key, "Statistics cache hit");
            return Ok(hit);
        }

        let base_key = key.without_participant();
        let hint = if query.use_concurrency {
            self.config.max_workers
        } else {
            1
        };

        let cached_base = match resolved.participant {
            Some(_) => self.stats_cache.get(&base_key),
            None => None,
        };
        let base = match cached_base {
            Some(base) => {
                debug!(key = %key, "Deriving participant view from cached base");
                base
            }
            None => {
                debug!(key = %base_key, "Statistics cache miss");
                self.base_statistics(&base_key, &resolved, hint).await
            }
        };

        let Some(participant) = resolved.participant else {
            return Ok(base);
        };

        let view = Arc::new(self.filter.filter(&base, &participant));
        self.stats_cache
            .set(key, Arc::clone(&view), self.ttl_for(&view.degraded));
        Ok(view)
    }

    /// Reopened bugs across `projects`, in project order
    ///
    /// Within a project, the most recent reopen comes first.
    pub async fn find_reopened_bugs<S: AsRef<str>>(
        &self,
        projects: &[S],
    ) -> Result<Vec<ReopenedBug>, CoreError> {
        let mut keys: Vec<ProjectKey> = Vec::with_capacity(projects.len());
        for raw in projects {
            let key = ProjectKey::parse(raw.as_ref())?;
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        if keys.is_empty() {
            return Err(CoreError::NoProjects);
        }

        let mut all = Vec::new();
        for project in &keys {
            let bugs = self.reopened_for(project).await;
            all.extend(bugs.iter().cloned());
        }

        info!(projects = keys.len(), reopened = all.len(), "Reopened bugs listed");
        Ok(all)
    }

    /// Status transitions across the `limit` most recently updated bugs
    pub async fn status_transitions(
        &self,
        project: &str,
        limit: usize,
    ) -> Result<TransitionReport, CoreError> {
        let project = ProjectKey::parse(project)?;
        if limit == 0 {
            return Err(CoreError::InvalidConfig {
                message: "transition limit must be at least 1".to_string(),
            });
        }

        let issues = self
            .issues
            .search(&IssueQuery::project(project.clone()))
            .await
            .map_err(|e| CoreError::source_unavailable(self.issues.name(), e.to_string()))?;

        let bugs: Vec<_> = issues
            .issues
            .into_iter()
            .filter(|issue| issue.project == project && issue.is_type(&self.config.bug_type))
            .collect();

        let report = transition_report(&bugs, self.collector.detector().matcher(), limit);
        debug!(
            project = %project,
            bugs = report.bugs_examined,
            transitions = report.transitions.len(),
            "Status transitions counted"
        );
        Ok(report)
    }

    /// Drop every cached entry of a project
    pub fn invalidate_project(&self, project: &str) -> Result<usize, CoreError> {
        let project = ProjectKey::parse(project)?;
        let dropped = self.stats_cache.invalidate_project(&project)
            + self.reopened_cache.invalidate_project(&project);
        debug!(project = %project, dropped, "Project cache invalidated");
        Ok(dropped)
    }

    // ===================
    // Internals
    // ===================

    /// Unfiltered statistics, computed at most once per key at a time
    async fn base_statistics(
        &self,
        base_key: &CacheKey,
        resolved: &Resolved,
        hint: usize,
    ) -> Arc<StatisticsResult> {
        let gate = self
            .inflight
            .entry(base_key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _turn = gate.lock().await;
            match self.stats_cache.get(base_key) {
                Some(ready) => {
                    debug!(key = %base_key, "Reusing result computed by a concurrent request");
                    ready
                }
                None => {
                    let computed = Arc::new(self.compute_base(resolved, hint).await);
                    let purged = self.stats_cache.purge_expired();
                    if purged > 0 {
                        debug!(purged, "Expired statistics dropped");
                    }
                    self.stats_cache.set(
                        base_key.clone(),
                        Arc::clone(&computed),
                        self.ttl_for(&computed.degraded),
                    );
                    computed
                }
            }
        };

        drop(gate);
        self.inflight
            .remove_if(base_key, |_, gate| Arc::strong_count(gate) == 1);
        result
    }

    async fn compute_base(&self, resolved: &Resolved, hint: usize) -> StatisticsResult {
        let project = &resolved.project;
        let query = IssueQuery::project(project.clone()).with_window(resolved.start, resolved.end);
        let mut report = DegradationReport::new();

        let mut issues = match self.issues.search(&query).await {
            Ok(found) => {
                report.merge(found.rejections(ISSUES));
                found.issues
            }
            Err(e) => {
                warn!(
                    project = %project,
                    source = self.issues.name(),
                    error = %e,
                    "Issue source failed, continuing with no issues"
                );
                report.record(
                    ISSUES,
                    &CoreError::source_unavailable(self.issues.name(), e.to_string()),
                );
                Vec::new()
            }
        };
        issues.retain(|issue| query.matches(issue));

        let generated_at = Utc::now();
        if issues.is_empty() {
            debug!(project = %project, "No issues in window");
            let mut empty = StatisticsResult::empty(generated_at);
            empty.degraded = report;
            return empty;
        }

        let participants = match self.participants.list_participants(project).await {
            Ok(participants) => participants,
            Err(e) => {
                warn!(
                    project = %project,
                    source = self.participants.name(),
                    error = %e,
                    "Participant source failed, continuing without participants"
                );
                report.record(
                    PARTICIPANTS,
                    &CoreError::source_unavailable(self.participants.name(), e.to_string()),
                );
                Vec::new()
            }
        };

        let issues: Arc<[IssueRecord]> = issues.into();
        let statuses = self.collector.classify_all(Arc::clone(&issues), hint).await;

        let digests: Vec<_> = issues
            .iter()
            .zip(statuses)
            .map(|(issue, status)| {
                if let ReopenStatus::Unclassifiable { reason } = &status {
                    report.record(
                        format!("classify:{}", issue.key),
                        &CoreError::Classification {
                            issue_key: issue.key.clone(),
                            reason: reason.clone(),
                        },
                    );
                }
                IssueDigest::new(issue, status)
            })
            .collect();

        let result = summarize(
            digests,
            SummaryContext {
                participants: &participants,
                generated_at,
                degraded: &report,
            },
            &self.summary,
        );

        info!(
            project = %project,
            issues = result.total_issues,
            bugs = result.bugs_count,
            reopened = result.reopened_bugs_count,
            degraded = result.degraded.is_degraded(),
            "Statistics computed"
        );
        result
    }

    async fn reopened_for(&self, project: &ProjectKey) -> Arc<Vec<ReopenedBug>> {
        let key = CacheKey::reopened(project);
        if let Some(hit) = self.reopened_cache.get(&key) {
            debug!(key = %key, "Reopened list cache hit");
            return hit;
        }

        let query = IssueQuery::project(project.clone());
        let (bugs, failed) = match self.issues.search(&query).await {
            Ok(found) => (self.reopened_in(project, found.issues).await, false),
            Err(e) => {
                warn!(
                    project = %project,
                    source = self.issues.name(),
                    error = %e,
                    "Issue source failed, no reopened bugs for project"
                );
                (Vec::new(), true)
            }
        };

        let ttl = if failed || bugs.is_empty() {
            self.config.degraded_ttl()
        } else {
            self.config.reopened_ttl()
        };
        let bugs = Arc::new(bugs);
        self.reopened_cache.purge_expired();
        self.reopened_cache.set(key, Arc::clone(&bugs), ttl);
        bugs
    }

    async fn reopened_in(
        &self,
        project: &ProjectKey,
        issues: Vec<IssueRecord>,
    ) -> Vec<ReopenedBug> {
        let bugs: Arc<[IssueRecord]> = issues
            .into_iter()
            .filter(|issue| &issue.project == project && issue.is_type(&self.config.bug_type))
            .collect();
        let statuses = self
            .collector
            .classify_all(Arc::clone(&bugs), self.config.max_workers)
            .await;

        let mut reopened: Vec<_> = bugs
            .iter()
            .zip(statuses)
            .filter_map(|(issue, status)| match status {
                ReopenStatus::Reopened(reopen) => Some(ReopenedBug {
                    issue: issue.clone(),
                    reopen,
                }),
                ReopenStatus::Unclassifiable { reason } => {
                    warn!(issue = %issue.key, reason = %reason, "Skipping unclassifiable bug");
                    None
                }
                _ => None,
            })
            .collect();

        reopened.sort_by(|a, b| {
            b.reopen
                .timestamp
                .cmp(&a.reopen.timestamp)
                .then_with(|| a.issue.key.cmp(&b.issue.key))
        });
        debug!(
            project = %project,
            bugs = bugs.len(),
            reopened = reopened.len(),
            "Bugs classified"
        );
        reopened
    }

    /// Results built on substituted inputs expire sooner
    fn ttl_for(&self, degraded: &DegradationReport) -> Duration {
        let (_, errors) = degraded.counts();
        if errors > 0 {
            self.config.degraded_ttl()
        } else {
            self.config.stats_ttl()
        }
    }
}
