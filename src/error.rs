//! Error types for memoization
//!
//! The cache core only ever fails in one way: an argument selected for the
//! fingerprint cannot be hashed. Failures of the wrapped callable are not
//! represented here; they travel back to the caller in the caller's own
//! error type and are never stored.

use std::fmt;
use thiserror::Error;

/// Reference to the argument that broke fingerprinting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentRef {
    /// Configured positional index
    Position(usize),
    /// Configured keyword name
    Keyword(String),
}

impl fmt::Display for ArgumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentRef::Position(index) => write!(f, "#{}", index),
            ArgumentRef::Keyword(name) => write!(f, "'{}'", name),
        }
    }
}

/// Classification of a [`CacheError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnhashableArgument,
}

/// Main error type for cache operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// A keyed argument holds a value that cannot be hashed
    #[error("Unhashable argument {argument}: values of type '{type_name}' cannot be fingerprinted")]
    UnhashableArgument {
        argument: ArgumentRef,
        type_name: &'static str,
    },
}

impl CacheError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::UnhashableArgument { .. } => ErrorKind::UnhashableArgument,
        }
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
