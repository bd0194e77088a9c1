//! Callable signatures
//!
//! The fingerprint needs to know which parameter sits at which position and
//! which parameters have defaults. That knowledge comes from a
//! [`SignatureResolver`]; it is queried once when a callable is wrapped and
//! the answer is kept as a [`Signature`].

use crate::value::Value;
use std::collections::HashMap;

/// Source of parameter metadata for a callable
pub trait SignatureResolver {
    /// Parameter names in declaration order
    fn parameters(&self) -> Vec<String>;

    /// Default values keyed by parameter name
    fn defaults(&self) -> HashMap<String, Value>;
}

/// Resolved parameter names and defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    parameters: Vec<String>,
    defaults: HashMap<String, Value>,
}

impl Signature {
    /// Create a signature from parameter names, without defaults
    pub fn new<I, S>(parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parameters: parameters.into_iter().map(Into::into).collect(),
            defaults: HashMap::new(),
        }
    }

    /// Signature with no parameters
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot any resolver
    pub fn resolve(resolver: &dyn SignatureResolver) -> Self {
        Self {
            parameters: resolver.parameters(),
            defaults: resolver.defaults(),
        }
    }

    /// Set a default value for a parameter
    pub fn with_default(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Prepend a receiver parameter, shifting every other position by one
    pub fn with_receiver(mut self, name: impl Into<String>) -> Self {
        self.parameters.insert(0, name.into());
        self
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn name_at(&self, position: usize) -> Option<&str> {
        self.parameters.get(position).map(String::as_str)
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p == name)
    }

    pub fn default_value(&self, name: &str) -> Option<&Value> {
        self.defaults.get(name)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

impl SignatureResolver for Signature {
    fn parameters(&self) -> Vec<String> {
        self.parameters.clone()
    }

    fn defaults(&self) -> HashMap<String, Value> {
        self.defaults.clone()
    }
}
