//! Data models for trackstat

pub mod identity;
pub mod issue;
pub mod stats;

pub use identity::{normalize_name, Identity, IdentityKey, UNASSIGNED, UNKNOWN_USER};
pub use issue::{ChangeEvent, IssueRecord, ProjectKey, ReopenEvent, ReopenedBug, STATUS_FIELD};
pub use stats::{
    AssigneeBugStat, IssueDigest, ParticipantActivity, RecentIssue, ReopenStatus, ReopenerCount,
    StatisticsResult, TransitionCount, TransitionReport,
};
