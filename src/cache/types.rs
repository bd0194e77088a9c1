//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Group namespace; `None` is the default group
pub type GroupName = Option<String>;

/// Stable identity of a wrapped callable
///
/// Allocated once per wrap, so two callables that share a name never share
/// cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallableId(Uuid);

impl CallableId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CallableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable group label for logs
pub(crate) fn group_label(group: &GroupName) -> &str {
    group.as_deref().unwrap_or("<default>")
}

/// Outcome of a cache lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lookup {
    /// Valid entry served from the cache
    Hit,
    /// No entry for the fingerprint
    Miss,
    /// Entry existed but outlived its timeout
    Expired,
}

impl Lookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit)
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Hit => write!(f, "hit"),
            Lookup::Miss => write!(f, "miss"),
            Lookup::Expired => write!(f, "expired"),
        }
    }
}

/// Statistics for a whole cache store
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CacheStats {
    /// Total number of cache hits
    pub hits: u64,

    /// Total number of lookups that found nothing
    pub misses: u64,

    /// Lookups that found an entry past its timeout
    pub expirations: u64,

    /// Entries dropped by group, callable or single-fingerprint invalidation
    pub invalidations: u64,

    /// Number of entries currently stored
    pub entries: usize,

    /// Number of groups currently known
    pub groups: usize,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.expirations;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }

    /// Number of times a wrapped callable had to run
    pub fn recomputations(&self) -> u64 {
        self.misses + self.expirations
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, expirations: {}, hit_rate: {:.2}%, entries: {}, groups: {} }}",
            self.hits,
            self.misses,
            self.expirations,
            self.hit_rate(),
            self.entries,
            self.groups
        )
    }
}

/// Hit/miss counters of a single memoized callable
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CallableStats {
    pub hits: u64,
    pub misses: u64,
}

impl CallableStats {
    pub fn calls(&self) -> u64 {
        self.hits + self.misses
    }
}
