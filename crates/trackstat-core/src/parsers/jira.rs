//! Parser for Jira REST issue payloads
//!
//! Accepts the search-endpoint shape (`{"issues": [...]}`) or a bare array
//! of issues, each optionally carrying `changelog.histories` (requested with
//! `expand=changelog`). Records are decoded one at a time so a single bad
//! issue does not reject the whole export.

use crate::error::CoreError;
use crate::models::{ChangeEvent, Identity, IdentityKey, IssueRecord, ProjectKey, UNKNOWN_USER};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

const UNKNOWN: &str = "Unknown";
const NO_SUMMARY: &str = "No summary";
const AVATAR_SIZE: &str = "48x48";

// ===================
// Raw payload
// ===================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawExport {
    Search { issues: Vec<Value> },
    Bare(Vec<Value>),
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    key: Option<String>,
    #[serde(default)]
    fields: RawFields,
    #[serde(default)]
    changelog: Option<RawChangelog>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFields {
    summary: Option<String>,
    status: Option<RawNamed>,
    issuetype: Option<RawNamed>,
    priority: Option<RawNamed>,
    assignee: Option<RawUser>,
    reporter: Option<RawUser>,
    created: Option<String>,
    updated: Option<String>,
    project: Option<RawProject>,
    comment: Option<RawComments>,
}

#[derive(Debug, Deserialize)]
struct RawNamed {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUser {
    account_id: Option<String>,
    key: Option<String>,
    name: Option<String>,
    display_name: Option<String>,
    email_address: Option<String>,
    avatar_urls: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct RawComments {
    #[serde(default)]
    comments: Vec<RawComment>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    author: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawChangelog {
    #[serde(default)]
    histories: Vec<RawHistory>,
}

#[derive(Debug, Deserialize)]
struct RawHistory {
    author: Option<RawUser>,
    created: Option<String>,
    #[serde(default)]
    items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    field: Option<String>,
    from_string: Option<String>,
    to_string: Option<String>,
}

// ===================
// Conversion
// ===================

/// Result of parsing an export: usable records plus the rejected ones
#[derive(Debug, Default)]
pub struct ParsedExport {
    pub issues: Vec<IssueRecord>,
    pub rejected: Vec<CoreError>,
}

/// Parse a whole export document
///
/// Fails only when the document itself is not JSON of a supported shape.
pub fn parse_export(content: &str, origin: &Path) -> Result<ParsedExport, CoreError> {
    let export: RawExport = serde_json::from_str(content).map_err(|e| CoreError::SourceParse {
        path: origin.to_path_buf(),
        message: e.to_string(),
        source: e,
    })?;

    let values = match export {
        RawExport::Search { issues } => issues,
        RawExport::Bare(issues) => issues,
    };

    let mut parsed = ParsedExport::default();
    for (index, value) in values.into_iter().enumerate() {
        match parse_issue(value) {
            Ok(issue) => parsed.issues.push(issue),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed issue");
                parsed.rejected.push(e);
            }
        }
    }

    debug!(
        path = %origin.display(),
        issues = parsed.issues.len(),
        rejected = parsed.rejected.len(),
        "Issue export parsed"
    );
    Ok(parsed)
}

/// Convert one issue payload into a typed record
pub fn parse_issue(value: Value) -> Result<IssueRecord, CoreError> {
    let hint = value
        .get("key")
        .and_then(Value::as_str)
        .unwrap_or("<no key>")
        .to_string();

    let raw: RawIssue = serde_json::from_value(value).map_err(|e| CoreError::MalformedRecord {
        key: hint.clone(),
        message: e.to_string(),
    })?;

    let key = raw
        .key
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| CoreError::MalformedRecord {
            key: hint,
            message: "missing issue key".to_string(),
        })?;

    let fields = raw.fields;
    let project = project_of(&key, fields.project.as_ref())?;

    let created = match fields.created.as_deref() {
        Some(s) => parse_timestamp(s).ok_or_else(|| CoreError::MalformedRecord {
            key: key.clone(),
            message: format!("unparseable created timestamp {:?}", s),
        })?,
        None => DateTime::<Utc>::UNIX_EPOCH,
    };
    let updated = match fields.updated.as_deref() {
        Some(s) => parse_timestamp(s).ok_or_else(|| CoreError::MalformedRecord {
            key: key.clone(),
            message: format!("unparseable updated timestamp {:?}", s),
        })?,
        None => created,
    };

    let (changes, history_error) = match raw.changelog {
        Some(changelog) => match convert_history(changelog.histories) {
            Ok(changes) => (changes, None),
            Err(reason) => (Vec::new(), Some(reason)),
        },
        None => (Vec::new(), None),
    };

    let commenters = fields
        .comment
        .map(|c| distinct_authors(c.comments))
        .unwrap_or_default();

    Ok(IssueRecord {
        project,
        summary: fields.summary.unwrap_or_else(|| NO_SUMMARY.to_string()),
        status: name_or_unknown(fields.status),
        issue_type: name_or_unknown(fields.issuetype),
        priority: fields.priority.and_then(|p| p.name),
        assignee: fields.assignee.map(identity),
        reporter: fields.reporter.map(identity),
        commenters,
        created,
        updated,
        changes,
        history_error,
        key,
    })
}

/// Parse the timestamp formats Jira emits
///
/// `2024-01-15T10:30:00.000+0000`, RFC 3339, or a bare date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}

fn project_of(key: &str, project: Option<&RawProject>) -> Result<ProjectKey, CoreError> {
    let raw = project
        .and_then(|p| p.key.as_deref())
        .or_else(|| key.split_once('-').map(|(prefix, _)| prefix))
        .unwrap_or(key);

    ProjectKey::parse(raw).map_err(|_| CoreError::MalformedRecord {
        key: key.to_string(),
        message: format!("cannot derive project from {:?}", raw),
    })
}

fn name_or_unknown(named: Option<RawNamed>) -> String {
    named
        .and_then(|n| n.name)
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn identity(user: RawUser) -> Identity {
    let display_name = user
        .display_name
        .or_else(|| user.name.clone())
        .unwrap_or_else(|| UNKNOWN_USER.to_string());

    Identity {
        account_id: user.account_id,
        key: user.key.or(user.name),
        display_name,
        email: user.email_address,
        avatar_url: user.avatar_urls.and_then(|mut urls| urls.remove(AVATAR_SIZE)),
    }
}

fn distinct_authors(comments: Vec<RawComment>) -> Vec<Identity> {
    let mut seen: HashSet<IdentityKey> = HashSet::new();
    comments
        .into_iter()
        .filter_map(|c| c.author.map(identity))
        .filter(|author| seen.insert(author.identity_key()))
        .collect()
}

/// Flatten histories into chronological change events
///
/// Any unreadable history timestamp invalidates the whole history, since a
/// partial one could hide the first reopen.
fn convert_history(histories: Vec<RawHistory>) -> Result<Vec<ChangeEvent>, String> {
    let mut changes = Vec::new();

    for history in histories {
        let created = history
            .created
            .as_deref()
            .ok_or_else(|| "history entry without timestamp".to_string())?;
        let timestamp = parse_timestamp(created)
            .ok_or_else(|| format!("unparseable history timestamp {:?}", created))?;
        let author = history.author.map(identity);

        for item in history.items {
            let Some(field) = item.field else { continue };
            changes.push(ChangeEvent {
                timestamp,
                author: author.clone(),
                field,
                from: item.from_string,
                to: item.to_string,
            });
        }
    }

    changes.sort_by_key(|c| c.timestamp);
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "key": "ABC-7",
            "fields": {
                "summary": "Login fails",
                "status": {"name": "To Do"},
                "issuetype": {"name": "Bug"},
                "priority": {"name": "High"},
                "assignee": {
                    "accountId": "acc-1",
                    "displayName": "Alice",
                    "emailAddress": "alice@example.com",
                    "avatarUrls": {"48x48": "https://a/48.png", "16x16": "https://a/16.png"}
                },
                "reporter": {"name": "bob", "displayName": "Bob"},
                "created": "2024-01-10T09:00:00.000+0000",
                "updated": "2024-01-15T10:30:00.000+0200",
                "project": {"key": "abc"},
                "comment": {"comments": [
                    {"author": {"displayName": "Carol"}},
                    {"author": {"displayName": "carol"}},
                    {"author": {"accountId": "acc-1", "displayName": "Alice"}}
                ]}
            },
            "changelog": {"histories": [
                {
                    "author": {"displayName": "Dave"},
                    "created": "2024-01-14T08:00:00.000+0000",
                    "items": [{"field": "status", "fromString": "Done", "toString": "To Do"}]
                },
                {
                    "author": {"displayName": "Alice"},
                    "created": "2024-01-12T08:00:00.000+0000",
                    "items": [
                        {"field": "status", "fromString": "In Progress", "toString": "Done"},
                        {"field": "resolution", "fromString": null, "toString": "Fixed"}
                    ]
                }
            ]}
        })
    }

    #[test]
    fn test_parse_full_issue() {
        let issue = parse_issue(sample()).unwrap();

        assert_eq!(issue.key, "ABC-7");
        assert_eq!(issue.project.as_str(), "ABC");
        assert_eq!(issue.status, "To Do");
        assert_eq!(issue.priority.as_deref(), Some("High"));
        assert_eq!(
            issue.updated,
            Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap()
        );

        let assignee = issue.assignee.as_ref().unwrap();
        assert_eq!(assignee.account_id.as_deref(), Some("acc-1"));
        assert_eq!(assignee.avatar_url.as_deref(), Some("https://a/48.png"));
        assert_eq!(issue.reporter.as_ref().unwrap().key.as_deref(), Some("bob"));

        // Carol appears once (same normalized name), Alice once
        assert_eq!(issue.commenters.len(), 2);

        // Sorted oldest first across histories
        assert_eq!(issue.changes.len(), 3);
        assert_eq!(issue.changes[0].to.as_deref(), Some("Done"));
        assert_eq!(issue.changes[2].from.as_deref(), Some("Done"));
        assert_eq!(issue.changes[2].author.as_ref().unwrap().display_name, "Dave");
        assert!(issue.history_error.is_none());
    }

    #[test]
    fn test_defaults_for_sparse_issue() {
        let issue = parse_issue(json!({"key": "XY-1", "fields": {}})).unwrap();
        assert_eq!(issue.project.as_str(), "XY");
        assert_eq!(issue.summary, NO_SUMMARY);
        assert_eq!(issue.status, UNKNOWN);
        assert_eq!(issue.issue_type, UNKNOWN);
        assert_eq!(issue.created, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(issue.updated, issue.created);
        assert!(issue.changes.is_empty());
    }

    #[test]
    fn test_missing_key_is_malformed() {
        let result = parse_issue(json!({"fields": {"summary": "x"}}));
        assert!(matches!(result, Err(CoreError::MalformedRecord { .. })));
    }

    #[test]
    fn test_bad_history_timestamp_marks_issue() {
        let issue = parse_issue(json!({
            "key": "XY-2",
            "changelog": {"histories": [
                {"created": "yesterday", "items": [{"field": "status", "fromString": "Done", "toString": "Open"}]}
            ]}
        }))
        .unwrap();

        assert!(issue.changes.is_empty());
        assert!(issue.history_error.unwrap().contains("yesterday"));
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T12:00:00.000+0000"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T13:00:00+01:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-01"),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("March 1st"), None);
    }

    #[test]
    fn test_export_shapes_and_rejections() {
        let path = Path::new("export.json");
        let search = json!({"issues": [sample(), {"fields": {}}]}).to_string();
        let parsed = parse_export(&search, path).unwrap();
        assert_eq!(parsed.issues.len(), 1);
        assert_eq!(parsed.rejected.len(), 1);

        let bare = json!([sample()]).to_string();
        assert_eq!(parse_export(&bare, path).unwrap().issues.len(), 1);

        let result = parse_export("{not json", path);
        assert!(matches!(result, Err(CoreError::SourceParse { .. })));
    }
}
