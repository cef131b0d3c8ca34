//! In-process TTL cache keyed by query shape
//!
//! Entries are immutable once written. A stale entry stays in storage
//! (visible through [`CacheStore::get_stale`]) but [`CacheStore::get`]
//! treats it as absent. Growth is bounded only by TTL purges; there is no
//! size-based eviction.
//!
//! Timestamps come from `tokio::time::Instant`, so tests can drive expiry
//! with a paused clock.

use crate::models::ProjectKey;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Marker for an absent date bound
const NO_DATE: &str = "-";

/// Marker for "all participants"
const ALL_PARTICIPANTS: &str = "*";

/// Opaque cache key
///
/// Built from normalized parts so logically equal requests collide:
/// `namespace|PROJECT|start|end|participant`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    rendered: String,
    project: ProjectKey,
    window: Option<(Option<NaiveDate>, Option<NaiveDate>)>,
}

impl CacheKey {
    /// Key for a statistics result
    ///
    /// The participant selector is only trimmed. Account ids and user keys
    /// match case-sensitively, so "Bob Jones" and "bob  jones" are separate
    /// entries even when both resolve to the same name-only identity.
    pub fn statistics(
        project: &ProjectKey,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        participant: Option<&str>,
    ) -> Self {
        let participant = participant
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(ALL_PARTICIPANTS);

        Self {
            rendered: format!(
                "stats|{}|{}|{}|{}",
                project,
                render_date(start),
                render_date(end),
                participant
            ),
            project: project.clone(),
            window: Some((start, end)),
        }
    }

    /// Key for a project's reopened-bug list
    pub fn reopened(project: &ProjectKey) -> Self {
        Self {
            rendered: format!("reopened|{}", project),
            project: project.clone(),
            window: None,
        }
    }

    /// The unfiltered key for the same project and window
    pub fn without_participant(&self) -> Self {
        match self.window {
            Some((start, end)) => Self::statistics(&self.project, start, end, None),
            None => self.clone(),
        }
    }

    pub fn project(&self) -> &ProjectKey {
        &self.project
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rendered)
    }
}

fn render_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| NO_DATE.to_string())
}

struct CacheEntry<V> {
    value: V,
    written_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.written_at) < self.ttl
    }
}

/// Counters for cache behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Thread-safe key/value store with per-entry expiry
///
/// A single mutex guards the map; writers overwrite unconditionally.
pub struct CacheStore<V> {
    entries: Mutex<HashMap<CacheKey, CacheEntry<V>>>,
    counters: Mutex<(u64, u64)>,
}

impl<V: Clone> CacheStore<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            counters: Mutex::new((0, 0)),
        }
    }

    /// Fresh value for `key`, or `None` if absent or expired
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = Instant::now();
        let found = {
            let entries = self.entries.lock();
            entries
                .get(key)
                .filter(|e| e.is_fresh(now))
                .map(|e| e.value.clone())
        };

        let mut counters = self.counters.lock();
        if found.is_some() {
            counters.0 += 1;
            trace!(key = %key, "Cache hit");
        } else {
            counters.1 += 1;
            trace!(key = %key, "Cache miss");
        }
        found
    }

    /// Stored value regardless of freshness
    pub fn get_stale(&self, key: &CacheKey) -> Option<V> {
        self.entries.lock().get(key).map(|e| e.value.clone())
    }

    /// Store `value` under `key`, replacing any previous entry
    pub fn set(&self, key: CacheKey, value: V, ttl: Duration) {
        trace!(key = %key, ttl_secs = ttl.as_secs(), "Cache write");
        self.entries.lock().insert(
            key,
            CacheEntry {
                value,
                written_at: Instant::now(),
                ttl,
            },
        );
    }

    /// True iff an entry exists and is younger than its TTL
    pub fn is_valid(&self, key: &CacheKey) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .map(|e| e.is_fresh(now))
            .unwrap_or(false)
    }

    /// Remove one entry; returns true if it existed
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Remove every entry belonging to `project`
    pub fn invalidate_project(&self, project: &ProjectKey) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| key.project() != project);
        let removed = before - entries.len();
        debug!(project = %project, removed, "Project cache entries invalidated");
        removed
    }

    /// Drop expired entries; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.is_fresh(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let (hits, misses) = *self.counters.lock();
        CacheStats {
            entries: self.len(),
            hits,
            misses,
        }
    }
}

impl<V: Clone> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
