//! # Memoization Cache
//!
//! Storage side of the memoization layer: where results live, how long they
//! stay valid and how they are dropped.
//!
//! ## Features
//!
//! - **Three-Level Layout**: group name -> callable identity -> fingerprint
//! - **Lazy Expiration**: timeouts are checked on read, stale entries are overwritten on refresh
//! - **Single Flight**: concurrent callers for one fingerprint share a single computation
//! - **Bulk Invalidation**: whole groups, single callables, single fingerprints or everything
//!
//! ## Example
//!
//! ```rust
//! use ouroboros_memo::cache::{CacheEntry, CacheStore, CallableId, ExpirationPolicy};
//! use ouroboros_memo::Fingerprint;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = CacheStore::new();
//! let callable = CallableId::new();
//! let group = Some("reports".to_string());
//! let policy = ExpirationPolicy::after(Duration::from_secs(60));
//!
//! let key = Fingerprint::from(vec![42]);
//! store
//!     .put(&group, callable, key.clone(), CacheEntry::from_value("report".to_string()))
//!     .await;
//!
//! if let Some(entry) = store.get(&group, callable, &key, &policy).await {
//!     println!("Cache hit: {:?}", entry.value_ref::<String>());
//! }
//!
//! store.delete_group(&group).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod expiration;
pub mod invalidation;
pub mod store;
pub mod types;

pub use config::{configure, CacheConfig, CacheConfigBuilder};
pub use entry::{CacheEntry, CacheMetadata, CachedValue};
pub use expiration::ExpirationPolicy;
pub use invalidation::{InvalidationEvent, InvalidationReason};
pub use store::CacheStore;
pub use types::{CacheStats, CallableId, CallableStats, GroupName, Lookup};
