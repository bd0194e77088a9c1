//! Fingerprint generation
//!
//! A fingerprint is the ordered tuple of hashes of the arguments a cache was
//! configured to key on. Arguments outside the [`KeySpec`] never influence it,
//! so callers can pass incidental flags without splitting the cache.
//!
//! Argument lookup follows ordinary call binding:
//!
//! - keyed position `i`: the `i`-th positional argument, else the keyword
//!   argument named like parameter `i`, else that parameter's default, else
//!   nothing (an absent argument without default contributes no hash)
//! - keyed name `k`: the keyword argument `k`, else a positional argument
//!   bound to `k` that sits after the last keyed position, else the default,
//!   else [`Value::None`]

use crate::args::CallArgs;
use crate::error::{ArgumentRef, CacheError, Result};
use crate::signature::Signature;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

static ABSENT: Value = Value::None;

/// Which arguments participate in the fingerprint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    /// Positional indices, in configured order
    pub positions: Vec<usize>,
    /// Keyword names, in configured order
    pub names: Vec<String>,
}

impl KeySpec {
    pub fn new<P, N, S>(positions: P, names: N) -> Self
    where
        P: IntoIterator<Item = usize>,
        N: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            positions: positions.into_iter().collect(),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.names.is_empty()
    }
}

/// Deterministic cache key for one call
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(Vec<u64>);

impl Fingerprint {
    pub fn hashes(&self) -> &[u64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u64>> for Fingerprint {
    fn from(hashes: Vec<u64>) -> Self {
        Self(hashes)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "-");
        }
        for (i, hash) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "-")?;
            }
            write!(f, "{:016x}", hash)?;
        }
        Ok(())
    }
}

/// Compute the fingerprint of a call
pub fn fingerprint(spec: &KeySpec, args: &CallArgs, signature: &Signature) -> Result<Fingerprint> {
    let mut selected: Vec<(ArgumentRef, &Value)> =
        Vec::with_capacity(spec.positions.len() + spec.names.len());

    for &index in &spec.positions {
        if let Some(value) = select_position(index, args, signature) {
            selected.push((ArgumentRef::Position(index), value));
        }
    }

    // Positional arguments past the last keyed index can stand in for
    // keyword names. Without keyed positions there is no such boundary.
    let mut positional_keywords: HashMap<&str, &Value> = HashMap::new();
    if let Some(&last) = spec.positions.last() {
        for (index, value) in args.args().iter().enumerate().skip(last + 1) {
            if let Some(name) = signature.name_at(index) {
                positional_keywords.insert(name, value);
            }
        }
    }

    for name in &spec.names {
        let value = args
            .kwarg(name)
            .or_else(|| positional_keywords.get(name.as_str()).copied())
            .or_else(|| signature.default_value(name))
            .unwrap_or(&ABSENT);
        selected.push((ArgumentRef::Keyword(name.clone()), value));
    }

    selected
        .into_iter()
        .map(|(argument, value)| {
            value
                .key_hash()
                .map_err(|type_name| CacheError::UnhashableArgument {
                    argument,
                    type_name,
                })
        })
        .collect::<Result<Vec<u64>>>()
        .map(Fingerprint)
}

fn select_position<'a>(
    index: usize,
    args: &'a CallArgs,
    signature: &'a Signature,
) -> Option<&'a Value> {
    if let Some(value) = args.arg(index) {
        return Some(value);
    }
    let name = signature.name_at(index)?;
    args.kwarg(name).or_else(|| signature.default_value(name))
}
