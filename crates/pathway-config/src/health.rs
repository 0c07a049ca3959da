use std::time::Duration;

use serde::Deserialize;

/// Rolling health window and status thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Maximum number of outcomes kept per model
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Maximum age of an outcome in the window
    #[serde(default = "default_window_duration", deserialize_with = "crate::duration::deserialize")]
    pub window_duration: Duration,
    /// Minimum success rate for `healthy`
    #[serde(default = "default_healthy_success_rate")]
    pub healthy_success_rate: f64,
    /// Minimum success rate for `degraded`
    #[serde(default = "default_degraded_success_rate")]
    pub degraded_success_rate: f64,
    /// Consecutive failures at which a model stops being `healthy`
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            window_duration: default_window_duration(),
            healthy_success_rate: default_healthy_success_rate(),
            degraded_success_rate: default_degraded_success_rate(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

const fn default_window_size() -> usize {
    100
}

const fn default_window_duration() -> Duration {
    Duration::from_secs(60 * 60)
}

const fn default_healthy_success_rate() -> f64 {
    0.95
}

const fn default_degraded_success_rate() -> f64 {
    0.80
}

const fn default_max_consecutive_failures() -> u32 {
    3
}
