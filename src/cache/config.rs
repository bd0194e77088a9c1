//! Per-callable cache configuration

use crate::fingerprint::KeySpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Configuration attached to one memoized callable
///
/// - `key_positions` / `key_names`: the arguments that form the fingerprint
/// - `timeout`: entry lifetime; `None` never expires
/// - `group`: namespace used for bulk invalidation; `None` is the default group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Positional argument indices to key on, in order
    pub key_positions: Vec<usize>,

    /// Keyword argument names to key on, in order
    pub key_names: Vec<String>,

    /// How long an entry stays valid after the callable ran
    pub timeout: Option<Duration>,

    /// Invalidation group
    pub group: Option<String>,

    /// Drain stream producers on the first call instead of buffering lazily
    pub precalculate: bool,
}

/// Build a configuration from its four core settings
pub fn configure<P, N, S>(
    key_positions: P,
    key_names: N,
    timeout: Option<Duration>,
    group: Option<&str>,
) -> CacheConfig
where
    P: IntoIterator<Item = usize>,
    N: IntoIterator<Item = S>,
    S: Into<String>,
{
    CacheConfig {
        key_positions: key_positions.into_iter().collect(),
        key_names: key_names.into_iter().map(Into::into).collect(),
        timeout,
        group: group.map(str::to_string),
        precalculate: false,
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for position in &self.key_positions {
            if !seen.insert(position) {
                return Err(format!("key position {} is listed more than once", position));
            }
        }

        let mut seen = HashSet::new();
        for name in &self.key_names {
            if !seen.insert(name) {
                return Err(format!("key name '{}' is listed more than once", name));
            }
        }

        if self.timeout == Some(Duration::ZERO) {
            return Err("timeout must be greater than 0 (use None to never expire)".to_string());
        }

        Ok(())
    }

    /// Argument selection used for fingerprinting
    pub fn key_spec(&self) -> KeySpec {
        KeySpec {
            positions: self.key_positions.clone(),
            names: self.key_names.clone(),
        }
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    key_positions: Vec<usize>,
    key_names: Vec<String>,
    timeout: Option<Duration>,
    group: Option<String>,
    precalculate: bool,
}

impl CacheConfigBuilder {
    /// Key on a positional argument
    pub fn key_position(mut self, position: usize) -> Self {
        self.key_positions.push(position);
        self
    }

    /// Key on several positional arguments
    pub fn key_positions(mut self, positions: impl IntoIterator<Item = usize>) -> Self {
        self.key_positions.extend(positions);
        self
    }

    /// Key on a keyword argument
    pub fn key_name(mut self, name: impl Into<String>) -> Self {
        self.key_names.push(name.into());
        self
    }

    /// Set entry timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set invalidation group
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Drain stream producers eagerly
    pub fn precalculate(mut self, enable: bool) -> Self {
        self.precalculate = enable;
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        CacheConfig {
            key_positions: self.key_positions,
            key_names: self.key_names,
            timeout: self.timeout,
            group: self.group,
            precalculate: self.precalculate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert!(config.key_positions.is_empty());
        assert!(config.key_names.is_empty());
        assert_eq!(config.timeout, None);
        assert_eq!(config.group, None);
        assert!(!config.precalculate);
        assert!(config.key_spec().is_empty());
    }

    #[test]
    fn test_configure() {
        let config = configure([0, 1], ["c"], Some(Duration::from_secs(60)), Some("reports"));
        assert_eq!(config.key_positions, vec![0, 1]);
        assert_eq!(config.key_names, vec!["c".to_string()]);
        assert_eq!(config.timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.group.as_deref(), Some("reports"));
    }

    #[test]
    fn test_config_validation() {
        assert!(CacheConfig::default().validate().is_ok());

        let config = configure([0, 0], Vec::<String>::new(), None, None);
        assert!(config.validate().is_err());

        let config = configure(Vec::new(), ["a", "a"], None, None);
        assert!(config.validate().is_err());

        let config = configure(Vec::new(), Vec::<String>::new(), Some(Duration::ZERO), None);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .key_position(0)
            .key_positions([2, 3])
            .key_name("verbose")
            .timeout(Duration::from_secs(600))
            .group("users")
            .precalculate(true)
            .build();

        assert_eq!(config.key_positions, vec![0, 2, 3]);
        assert_eq!(config.key_names, vec!["verbose".to_string()]);
        assert_eq!(config.timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.group.as_deref(), Some("users"));
        assert!(config.precalculate);

        let spec = config.key_spec();
        assert_eq!(spec.positions, vec![0, 2, 3]);
    }

    #[test]
    fn test_config_serde() {
        let config = CacheConfig::builder().key_position(1).group("g").build();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: CacheConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
