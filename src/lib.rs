//! # Ouroboros Memo (ouroboros-memo)
//!
//! Result memoization for async Rust, keyed on a chosen subset of a call's
//! arguments.
//!
//! ## Features
//!
//! - Fingerprints built from selected positional and keyword arguments, with defaults applied
//! - Per-callable timeouts, checked lazily on read
//! - Group namespaces for bulk invalidation
//! - Replay of stream-producing callables without re-running them
//! - At most one computation per fingerprint under concurrent callers
//! - Errors of the wrapped callable are passed through and never cached
//!
//! ## Memoizing a Function
//!
//! Only argument 0 is keyed, so calls that differ in `verbose` share a result.
//!
//! ```rust
//! use ouroboros_memo::{configure, CallArgs, Memoizer, Signature, Value};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let memo = Memoizer::new();
//! let signature = Signature::new(["user_id", "verbose"]).with_default("verbose", false);
//!
//! let load_profile = memo.wrap(
//!     "load_profile",
//!     &signature,
//!     configure([0], Vec::<String>::new(), None, Some("profiles")),
//!     |args: CallArgs| async move {
//!         let id = args.arg(0).and_then(Value::as_i64).unwrap_or_default();
//!         Ok::<_, anyhow::Error>(format!("profile-{}", id))
//!     },
//! );
//!
//! let first = load_profile.call(CallArgs::positional([7])).await?;
//! let again = load_profile
//!     .call(CallArgs::positional([7]).with_kwarg("verbose", true))
//!     .await?;
//! assert_eq!(first, again);
//!
//! memo.invalidate_group(Some("profiles")).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Memoizing a Stream
//!
//! The producer runs once; every call gets its own cursor over the recorded
//! items.
//!
//! ```rust
//! use futures::stream;
//! use ouroboros_memo::{CacheConfig, CallArgs, Memoizer, Signature};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let memo = Memoizer::new();
//! let pages = memo.wrap_stream(
//!     "pages",
//!     &Signature::new(["section"]),
//!     CacheConfig::builder().key_position(0).build(),
//!     |_args: CallArgs| stream::iter(vec!["intro", "body", "outro"]),
//! );
//!
//! let mut cursor = pages.call(CallArgs::positional(["guide"])).await?;
//! while let Some(page) = cursor.next().await {
//!     println!("{}", page);
//! }
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod memoize;
pub mod replay;
pub mod signature;
pub mod value;

// Re-export main types for convenience
pub use args::CallArgs;
pub use cache::{
    configure, CacheConfig, CacheConfigBuilder, CacheEntry, CacheMetadata, CacheStats, CacheStore,
    CallableId, CallableStats, ExpirationPolicy, GroupName, InvalidationEvent, InvalidationReason,
    Lookup,
};
pub use error::{ArgumentRef, CacheError, ErrorKind, Result};
pub use fingerprint::{fingerprint, Fingerprint, KeySpec};
pub use memoize::{BoundMethod, Memoized, MemoizedFn, MemoizedStream, Memoizer};
pub use replay::{ReplayBuffer, ReplayCursor, ReplayPhase};
pub use signature::{Signature, SignatureResolver};
pub use value::Value;
