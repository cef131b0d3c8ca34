//! Issue analytics: reopen detection, per-assignee bug tallies,
//! statistics assembly and participant views.

pub mod collector;
pub mod filter;
pub mod reopen;
pub mod summary;
pub mod transitions;


pub use collector::{merge, sorted_stats, AssigneeBugCollector, AssigneeTally, IssueClassification};
pub use filter::ParticipantFilter;
pub use reopen::{ReopenDetector, StatusMatcher};
pub use summary::{summarize, SummaryContext, SummaryOptions};
pub use transitions::transition_report;
