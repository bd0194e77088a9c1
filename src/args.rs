//! Arguments of a single call

use crate::signature::Signature;
use crate::value::Value;
use std::collections::BTreeMap;

/// Positional and keyword arguments passed to a memoized callable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from positional values only
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            keyword: BTreeMap::new(),
        }
    }

    /// Append a positional argument
    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument
    pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Insert a value in front of the positional arguments
    pub fn prepend(mut self, value: impl Into<Value>) -> Self {
        self.positional.insert(0, value.into());
        self
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    pub fn args(&self) -> &[Value] {
        &self.positional
    }

    pub fn kwargs(&self) -> &BTreeMap<String, Value> {
        &self.keyword
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Bind a parameter the way an ordinary call would: positional slot
    /// first, then keyword, then the signature's default
    pub fn resolve<'a>(&'a self, name: &str, signature: &'a Signature) -> Option<&'a Value> {
        signature
            .position_of(name)
            .and_then(|position| self.positional.get(position))
            .or_else(|| self.keyword.get(name))
            .or_else(|| signature.default_value(name))
    }
}
