//! Performance benchmarks for batch classification
//!
//! Compares the inline path against the worker pool for growing batches,
//! and measures the participant view derived from a base result.

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use trackstat_core::analytics::{AssigneeBugCollector, ParticipantFilter};
use trackstat_core::models::{ChangeEvent, Identity, IssueRecord, ProjectKey};
use trackstat_core::{StaticIssueSource, StatisticsAggregator, StatisticsQuery, StatsConfig};

/// Generate bugs with a short workflow history; every seventh is reopened
fn generate_issues(count: usize) -> Vec<IssueRecord> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let project = ProjectKey::parse("BENCH").unwrap();
    let people: Vec<_> = (0..20)
        .map(|i| Identity::with_account(format!("acc-{}", i), format!("Person {}", i)))
        .collect();

    let transition = |minutes: i64, from: &str, to: &str| ChangeEvent {
        timestamp: start + Duration::minutes(minutes),
        author: Some(people[minutes as usize % people.len()].clone()),
        field: "status".to_string(),
        from: Some(from.to_string()),
        to: Some(to.to_string()),
    };

    (0..count)
        .map(|i| {
            let mut changes = vec![
                transition(i as i64, "To Do", "In Progress"),
                transition(i as i64 + 1, "In Progress", "In Review"),
                transition(i as i64 + 2, "In Review", "Done"),
            ];
            if i % 7 == 0 {
                changes.push(transition(i as i64 + 3, "Done", "Reopened"));
            }

            IssueRecord {
                key: format!("BENCH-{}", i),
                project: project.clone(),
                summary: format!("Issue {}", i),
                status: "Done".to_string(),
                issue_type: if i % 4 == 0 { "Task" } else { "Bug" }.to_string(),
                priority: None,
                assignee: Some(people[i % people.len()].clone()),
                reporter: Some(people[(i + 3) % people.len()].clone()),
                commenters: vec![people[(i + 5) % people.len()].clone()],
                created: start,
                updated: start + Duration::hours(i as i64),
                changes,
                history_error: None,
            }
        })
        .collect()
}

/// Benchmark 1: collect with inline vs pooled classification
fn collect_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let collector = AssigneeBugCollector::from_config(&StatsConfig::default());
    let mut group = c.benchmark_group("collect");

    for count in [100, 1_000, 10_000] {
        let issues: Arc<[IssueRecord]> = generate_issues(count).into();

        group.bench_with_input(BenchmarkId::new("inline", count), &issues, |b, issues| {
            b.to_async(&runtime)
                .iter(|| async { black_box(collector.collect(Arc::clone(issues), 1).await) });
        });

        group.bench_with_input(BenchmarkId::new("pooled", count), &issues, |b, issues| {
            b.to_async(&runtime).iter(|| async {
                black_box(collector.collect(Arc::clone(issues), usize::MAX).await)
            });
        });
    }

    group.finish();
}

/// Benchmark 2: participant view over a cached base result
fn filter_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let source = Arc::new(StaticIssueSource::new(generate_issues(5_000)));
    let aggregator =
        StatisticsAggregator::with_derived_participants(source, StatsConfig::default()).unwrap();
    let base = runtime
        .block_on(aggregator.get_project_statistics(&StatisticsQuery::new("BENCH")))
        .unwrap();
    let filter = ParticipantFilter::default();

    c.bench_function("participant_view_5000", |b| {
        b.iter(|| black_box(filter.filter(&base, "acc-3")));
    });
}

criterion_group!(benches, collect_benchmark, filter_benchmark);
criterion_main!(benches);
