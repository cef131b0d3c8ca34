//! User identities as reported by the issue tracker
//!
//! Tallies are grouped by [`IdentityKey`], never by raw display strings.
//! The key follows a fallback chain: account id, then legacy user key,
//! then normalized display name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Display name used for issues without an assignee
pub const UNASSIGNED: &str = "Unassigned";

/// Display name used when the tracker omits the actor of a change
pub const UNKNOWN_USER: &str = "Unknown";

/// A person known to the tracker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable account identifier (cloud trackers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    /// Legacy user key (server trackers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Identity {
    /// Identity known only by its display name
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            account_id: None,
            key: None,
            display_name: display_name.into(),
            email: None,
            avatar_url: None,
        }
    }

    /// Identity with a stable account id
    pub fn with_account(account_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            account_id: Some(account_id.into()),
            ..Self::named(display_name)
        }
    }

    /// Placeholder grouping all issues without an assignee
    pub fn unassigned() -> Self {
        Self::named(UNASSIGNED)
    }

    /// Grouping key for tallies
    pub fn identity_key(&self) -> IdentityKey {
        if let Some(id) = non_blank(self.account_id.as_deref()) {
            IdentityKey::Account(id.to_string())
        } else if let Some(key) = non_blank(self.key.as_deref()) {
            IdentityKey::UserKey(key.to_string())
        } else {
            IdentityKey::Name(normalize_name(&self.display_name))
        }
    }

    /// True if `selector` names this identity
    ///
    /// Identities with a stable id are matched by account id or user key only.
    /// Identities without one fall back to a normalized display-name match.
    pub fn matches(&self, selector: &str) -> bool {
        let selector = selector.trim();
        if selector.is_empty() {
            return false;
        }

        let account = non_blank(self.account_id.as_deref());
        let key = non_blank(self.key.as_deref());
        if account.is_some() || key.is_some() {
            return account == Some(selector) || key == Some(selector);
        }

        normalize_name(&self.display_name) == normalize_name(selector)
    }

    /// Deterministic choice between two display records of the same key
    ///
    /// Keeps tallies independent of merge order when the tracker reports
    /// the same account under differently cased names.
    pub(crate) fn canonical<'a>(&'a self, other: &'a Identity) -> &'a Identity {
        let lhs = (&self.display_name, &self.email, &self.avatar_url);
        let rhs = (&other.display_name, &other.email, &other.avatar_url);
        if rhs < lhs {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name)
    }
}

/// Equality/merge key for identities
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IdentityKey {
    Account(String),
    UserKey(String),
    /// Lowercased display name with collapsed whitespace
    Name(String),
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Account(id) => write!(f, "account:{}", id),
            IdentityKey::UserKey(key) => write!(f, "key:{}", key),
            IdentityKey::Name(name) => write!(f, "name:{}", name),
        }
    }
}

/// Lowercase and collapse internal whitespace
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
