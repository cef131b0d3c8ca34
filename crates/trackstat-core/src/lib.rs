//! trackstat-core - Core library for trackstat
//!
//! Project statistics, reopened-bug detection and per-assignee bug tallies
//! over issue-tracker data, with a TTL cache in front of the sources.

pub mod aggregator;
pub mod analytics;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod parsers;
pub mod source;

pub use aggregator::{StatisticsAggregator, StatisticsQuery};
pub use config::StatsConfig;
pub use error::{CoreError, Degradation, DegradationReport, Severity};
pub use source::{
    DerivedParticipantSource, IssueQuery, IssueSource, JsonIssueSource, ParticipantSource,
    SearchOutcome, StaticIssueSource,
};
