//! Expiration policy
//!
//! Timeouts belong to the memoized callable, not to individual entries, and
//! are checked lazily when an entry is read. Nothing sweeps stale entries in
//! the background; the next refresh simply overwrites them.

use crate::cache::entry::CacheEntry;
use std::time::Duration;
use tokio::time::Instant;

/// Decides whether a stored entry is still valid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpirationPolicy {
    timeout: Option<Duration>,
}

impl ExpirationPolicy {
    /// Entries never expire
    pub fn never() -> Self {
        Self { timeout: None }
    }

    /// Entries expire once they are older than `timeout`
    pub fn after(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// `now - created_at > timeout`; an entry exactly `timeout` old is still valid
    pub fn is_expired(&self, created_at: Instant, now: Instant) -> bool {
        match self.timeout {
            None => false,
            Some(timeout) => now.saturating_duration_since(created_at) > timeout,
        }
    }

    /// Check an entry against the current time
    pub fn is_entry_expired(&self, entry: &CacheEntry) -> bool {
        self.is_expired(entry.created_at, Instant::now())
    }

    /// Time left before an entry expires, `None` if it never does
    pub fn time_until_expiration(&self, entry: &CacheEntry) -> Option<Duration> {
        let timeout = self.timeout?;
        Some(timeout.saturating_sub(entry.age()))
    }
}

impl From<Option<Duration>> for ExpirationPolicy {
    fn from(timeout: Option<Duration>) -> Self {
        Self::from_timeout(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_expires() {
        let policy = ExpirationPolicy::never();
        let created = Instant::now();
        let much_later = created + Duration::from_secs(10 * 365 * 24 * 3600);

        assert!(!policy.is_expired(created, much_later));
        assert_eq!(policy.timeout(), None);
    }

    #[test]
    fn test_timeout_boundary() {
        let policy = ExpirationPolicy::after(Duration::from_secs(60));
        let created = Instant::now();

        assert!(!policy.is_expired(created, created + Duration::from_millis(59_999)));
        assert!(!policy.is_expired(created, created + Duration::from_secs(60)));
        assert!(policy.is_expired(created, created + Duration::from_millis(60_001)));
    }

    #[test]
    fn test_clock_before_creation_is_not_expired() {
        let policy = ExpirationPolicy::after(Duration::from_secs(1));
        let now = Instant::now();
        let created = now + Duration::from_secs(5);

        assert!(!policy.is_expired(created, now));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expiration() {
        let policy = ExpirationPolicy::after(Duration::from_millis(100));
        let entry = CacheEntry::from_value("value");

        assert!(!policy.is_entry_expired(&entry));
        assert_eq!(
            policy.time_until_expiration(&entry),
            Some(Duration::from_millis(100))
        );

        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(policy.is_entry_expired(&entry));
        assert_eq!(policy.time_until_expiration(&entry), Some(Duration::ZERO));
    }

    #[test]
    fn test_from_option() {
        let policy: ExpirationPolicy = Some(Duration::from_secs(3)).into();
        assert_eq!(policy, ExpirationPolicy::after(Duration::from_secs(3)));

        let policy: ExpirationPolicy = None.into();
        assert_eq!(policy, ExpirationPolicy::never());
    }
}
