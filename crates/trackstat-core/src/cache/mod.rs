//! Caching layer for trackstat-core
//!
//! Provides the TTL store shared by statistics and reopened-bug lookups.

pub mod store;

pub use store::{CacheKey, CacheStats, CacheStore};
