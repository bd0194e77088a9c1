//! Cache entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Type-erased cached result
///
/// A single store holds results of many callables with different result
/// types; each memoized callable downcasts back to its own type.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// A memoized result together with the moment it was computed
#[derive(Clone)]
pub struct CacheEntry {
    /// The cached value
    pub value: CachedValue,

    /// When the wrapped callable last ran for this slot (monotonic)
    pub created_at: Instant,

    /// Entry metadata
    pub metadata: CacheMetadata,
}

impl CacheEntry {
    /// Create an entry stamped with the current time
    pub fn new(value: CachedValue) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            metadata: CacheMetadata {
                created_at: Utc::now(),
                version: 1,
            },
        }
    }

    /// Wrap a concrete value
    pub fn from_value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new(Arc::new(value))
    }

    /// Create the entry that replaces `previous` in its slot
    pub fn refresh(previous: Option<&CacheEntry>, value: CachedValue) -> Self {
        let mut entry = Self::new(value);
        if let Some(previous) = previous {
            entry.metadata.version = previous.metadata.version + 1;
        }
        entry
    }

    /// Borrow the value as `T`
    pub fn value_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Share the value as `Arc<T>`
    pub fn value_arc<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    /// Get the age of the entry
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.created_at)
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("created_at", &self.created_at)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Metadata associated with a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Wall-clock time of the computation
    pub created_at: DateTime<Utc>,

    /// Number of computations the slot has seen (1 for the first)
    pub version: u64,
}
