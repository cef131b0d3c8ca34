//! Formatting and argument helpers for the trackstat commands

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate};
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use trackstat_core::models::{ReopenedBug, StatisticsResult, TransitionReport};
use trackstat_core::Severity;

// ============================================================================
// Date Bounds
// ============================================================================

/// Parse a date bound: "7d", "3m", "1y" (relative to `today`) or "YYYY-MM-DD"
pub fn parse_date_bound(s: &str, today: NaiveDate) -> Result<NaiveDate> {
    let s = s.trim();
    let relative = |digits: &str, days_per_unit: i64, example: &str| -> Result<NaiveDate> {
        let n = digits
            .parse::<u32>()
            .with_context(|| format!("Invalid relative date (expected: {})", example))?;
        let offset = i64::from(n)
            .checked_mul(days_per_unit)
            .and_then(Duration::try_days);
        match offset.and_then(|offset| today.checked_sub_signed(offset)) {
            Some(date) => Ok(date),
            None => bail!("Relative date {} is out of range", s),
        }
    };

    if let Some(stripped) = s.strip_suffix('d') {
        return relative(stripped, 1, "7d");
    }
    if let Some(stripped) = s.strip_suffix('m') {
        return relative(stripped, 30, "3m");
    }
    if let Some(stripped) = s.strip_suffix('y') {
        return relative(stripped, 365, "1y");
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d").context("Invalid date format (expected: YYYY-MM-DD)")
}

/// Parse optional `--since` / `--until` into an ordered window
pub fn parse_window(
    since: Option<&str>,
    until: Option<&str>,
    today: NaiveDate,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>)> {
    let start = since.map(|s| parse_date_bound(s, today)).transpose()?;
    let end = until.map(|s| parse_date_bound(s, today)).transpose()?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            bail!("--since ({}) is after --until ({})", start, end);
        }
    }
    Ok((start, end))
}

// ============================================================================
// Formatters
// ============================================================================

fn header(table: &mut Table, columns: &[&str], no_color: bool) {
    if no_color {
        table.set_header(columns.to_vec());
    } else {
        table.set_header(
            columns
                .iter()
                .map(|c| Cell::new(c).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Format project statistics (human) or JSON
pub fn format_statistics(
    project: &str,
    stats: &StatisticsResult,
    json: bool,
    no_color: bool,
) -> String {
    if json {
        return serde_json::to_string_pretty(stats).unwrap_or_else(|_| "{}".to_string());
    }

    let mut lines = vec![
        format!("{} - Issue Statistics", project),
        "=".repeat(project.chars().count() + 19),
        String::new(),
        format!("Issues:           {}", stats.total_issues),
        format!("Completed:        {}", stats.completed_count),
        format!("Bugs:             {}", stats.bugs_count),
        format!(
            "Reopened bugs:    {} ({})",
            stats.reopened_bugs_count,
            percent(stats.reopened_bugs_count, stats.bugs_count)
        ),
        format!("Participants:     {}", stats.total_participants),
    ];

    if stats.is_empty() {
        lines.push(String::new());
        lines.push("No issues in range.".to_string());
    } else {
        let mut counts = new_table();
        header(&mut counts, &["Status", "Issues"], no_color);
        for (status, count) in &stats.status_counts {
            counts.add_row(Row::from(vec![status.clone(), count.to_string()]));
        }
        lines.push(String::new());
        lines.push(counts.to_string());

        if !stats.assignee_bug_stats.is_empty() {
            let mut assignees = new_table();
            header(&mut assignees, &["Assignee", "Bugs", "Reopened", "Rate"], no_color);
            for stat in &stats.assignee_bug_stats {
                assignees.add_row(Row::from(vec![
                    stat.assignee.display_name.clone(),
                    stat.total.to_string(),
                    stat.reopened.to_string(),
                    percent(stat.reopened, stat.total),
                ]));
            }
            lines.push(String::new());
            lines.push(assignees.to_string());
        }

        if !stats.reopeners.is_empty() {
            lines.push(String::new());
            lines.push("Reopened by:".to_string());
            for reopener in &stats.reopeners {
                lines.push(format!("  {}: {}", reopener.name, reopener.count));
            }
        }
    }

    if stats.degraded.is_degraded() {
        lines.push(String::new());
        lines.push("Warnings:".to_string());
        for entry in &stats.degraded.entries {
            let level = match entry.severity {
                Severity::Warning => "warn",
                Severity::Error => "error",
            };
            lines.push(format!("  - [{}] {}: {}", level, entry.source, entry.message));
        }
    }

    lines.join("\n")
}

/// Format reopened bugs as table (human) or JSON
pub fn format_reopened(bugs: &[ReopenedBug], json: bool, no_color: bool) -> String {
    if json {
        return serde_json::to_string_pretty(bugs).unwrap_or_else(|_| "[]".to_string());
    }

    if bugs.is_empty() {
        return "No reopened bugs found.".to_string();
    }

    let mut table = new_table();
    header(
        &mut table,
        &["Key", "Summary", "Assignee", "Reopened", "Transition", "By"],
        no_color,
    );

    for bug in bugs {
        let assignee = bug
            .issue
            .assignee
            .as_ref()
            .map(|a| a.display_name.clone())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(Row::from(vec![
            bug.issue.key.clone(),
            truncate(&bug.issue.summary, 40),
            assignee,
            bug.reopen.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            format!("{} → {}", bug.reopen.from_status, bug.reopen.to_status),
            bug.reopen.actor_name().to_string(),
        ]));
    }

    table.to_string()
}

/// Format a status transition report (human) or JSON
pub fn format_transitions(report: &TransitionReport, json: bool, no_color: bool) -> String {
    if json {
        return serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
    }

    if report.transitions.is_empty() {
        return format!(
            "No status transitions in {} bugs examined.",
            report.bugs_examined
        );
    }

    let mut table = new_table();
    header(&mut table, &["Transition", "Count", "Reopen"], no_color);
    for transition in &report.transitions {
        let reopen = if report.reopen_candidates.contains(transition) {
            "yes"
        } else {
            ""
        };
        table.add_row(Row::from(vec![
            transition.label(),
            transition.count.to_string(),
            reopen.to_string(),
        ]));
    }

    format!(
        "{} bugs examined, {} distinct transitions\n{}",
        report.bugs_examined,
        report.transitions.len(),
        table
    )
}

// ============================================================================
// Utilities
// ============================================================================

fn percent(part: u64, whole: u64) -> String {
    if whole == 0 {
        "-".to_string()
    } else {
        format!("{:.1}%", part as f64 * 100.0 / whole as f64)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max - 1).collect::<String>() + "…"
    }
}

// ============================================================================
// Tests
// ============================================================================
