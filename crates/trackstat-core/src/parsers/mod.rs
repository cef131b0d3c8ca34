//! Parsers for issue-tracker payloads

pub mod jira;

pub use jira::{parse_export, parse_issue, parse_timestamp, ParsedExport};
