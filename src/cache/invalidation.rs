//! Cache invalidation
//!
//! Entries leave the store in three ways besides being overwritten:
//! - Group: everything stored under a group name
//! - Callable: one callable's entries within its group
//! - Fingerprint: a single entry
//!
//! Each bulk operation reports what it dropped as an [`InvalidationEvent`].

use crate::cache::types::{CallableId, GroupName};
use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason for cache invalidation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// Whole group cleared
    Group,

    /// All entries of one callable cleared
    Callable { callable: CallableId },

    /// A single fingerprint removed
    Fingerprint {
        callable: CallableId,
        fingerprint: Fingerprint,
    },

    /// Every group cleared
    Clear,
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidationReason::Group => write!(f, "group invalidation"),
            InvalidationReason::Callable { callable } => {
                write!(f, "callable invalidation: {}", callable)
            }
            InvalidationReason::Fingerprint {
                callable,
                fingerprint,
            } => write!(f, "fingerprint invalidation: {} [{}]", callable, fingerprint),
            InvalidationReason::Clear => write!(f, "full clear"),
        }
    }
}

/// Record of a completed invalidation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationEvent {
    /// Reason for invalidation
    pub reason: InvalidationReason,

    /// Group the invalidation applied to (`None` for the default group or a full clear)
    pub group: GroupName,

    /// Number of entries dropped
    pub removed: usize,

    /// When the invalidation occurred
    pub timestamp: DateTime<Utc>,
}

impl InvalidationEvent {
    /// Create a new invalidation event
    pub fn new(reason: InvalidationReason, group: GroupName, removed: usize) -> Self {
        Self {
            reason,
            group,
            removed,
            timestamp: Utc::now(),
        }
    }

    /// Whether anything was actually dropped
    pub fn is_noop(&self) -> bool {
        self.removed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidation_reason_display() {
        assert_eq!(InvalidationReason::Group.to_string(), "group invalidation");
        assert_eq!(InvalidationReason::Clear.to_string(), "full clear");

        let callable = CallableId::new();
        let reason = InvalidationReason::Callable { callable };
        assert!(reason.to_string().contains(&callable.to_string()));

        let reason = InvalidationReason::Fingerprint {
            callable,
            fingerprint: Fingerprint::from(vec![0xab]),
        };
        assert!(reason.to_string().contains("00000000000000ab"));
    }

    #[test]
    fn test_invalidation_event() {
        let event = InvalidationEvent::new(
            InvalidationReason::Group,
            Some("reports".to_string()),
            3,
        );

        assert_eq!(event.removed, 3);
        assert_eq!(event.group.as_deref(), Some("reports"));
        assert!(!event.is_noop());
        assert!(InvalidationEvent::new(InvalidationReason::Clear, None, 0).is_noop());
    }

    #[test]
    fn test_invalidation_event_serializes() {
        let event = InvalidationEvent::new(InvalidationReason::Group, None, 1);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["removed"], 1);
        assert!(json["group"].is_null());
    }
}
