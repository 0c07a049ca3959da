use std::time::Duration;

use serde::Deserialize;

/// Limits applied when walking a fallback chain
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Maximum attempts per request, including the primary
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Timeout applied when the request does not carry one
    #[serde(default, deserialize_with = "crate::duration::deserialize_option")]
    pub default_timeout: Option<Duration>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            default_timeout: None,
        }
    }
}

const fn default_max_attempts() -> usize {
    3
}

/// Retention for the outcome history log
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    /// Maximum number of outcomes kept
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Maximum age of a kept outcome
    #[serde(default = "default_retention", deserialize_with = "crate::duration::deserialize")]
    pub retention: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            retention: default_retention(),
        }
    }
}

const fn default_max_entries() -> usize {
    10_000
}

const fn default_retention() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

/// Periodic health summary sweep
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    /// Whether the sweep task runs
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Interval between sweeps
    #[serde(default = "default_sweep_interval", deserialize_with = "crate::duration::deserialize")]
    pub interval: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_sweep_interval(),
        }
    }
}

const fn default_sweep_interval() -> Duration {
    Duration::from_secs(30)
}

/// In-memory response cache
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Whether responses are cached
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Time to live for a cached response
    #[serde(default = "default_cache_ttl", deserialize_with = "crate::duration::deserialize")]
    pub ttl: Duration,
    /// Maximum number of cached responses
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: default_cache_ttl(),
            max_capacity: default_cache_capacity(),
        }
    }
}

const fn default_cache_ttl() -> Duration {
    Duration::from_secs(10 * 60)
}

const fn default_cache_capacity() -> u64 {
    10_000
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}
