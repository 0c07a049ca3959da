use std::time::Duration;

use serde::Deserialize;

/// Circuit breaker parameters shared by every model
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    /// Failures (since the last success) that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// How long the circuit stays open after the first trip
    #[serde(default = "default_base_backoff", deserialize_with = "crate::duration::deserialize")]
    pub base_backoff: Duration,
    /// Backoff growth factor applied on each failed trial
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Upper bound for the open period
    #[serde(default = "default_max_backoff", deserialize_with = "crate::duration::deserialize")]
    pub max_backoff: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            base_backoff: default_base_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff: default_max_backoff(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Open period after `open_count` consecutive trips (1 = first trip)
    pub fn backoff_for(&self, open_count: u32) -> Duration {
        let exponent = i32::try_from(open_count.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let secs = self.base_backoff.as_secs_f64() * factor;

        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }

        Duration::from_secs_f64(secs)
    }
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_base_backoff() -> Duration {
    Duration::from_secs(30)
}

const fn default_backoff_multiplier() -> f64 {
    2.0
}

const fn default_max_backoff() -> Duration {
    Duration::from_secs(10 * 60)
}
