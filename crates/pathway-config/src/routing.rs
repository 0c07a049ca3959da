use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

/// Ranking strategy used to order candidate models
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, serde::Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StrategyKind {
    /// Highest success rate, ties broken by lowest latency
    #[default]
    Default,
    /// Lowest latency above the success-rate floor
    Performance,
    /// Lowest cost above the success-rate floor
    CostOptimized,
    /// Weighted random spread inversely proportional to recent traffic
    LoadBalanced,
}

/// Routing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Strategy used when neither the request nor the use case picks one
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Per-use-case strategy overrides
    #[serde(default)]
    pub use_cases: HashMap<String, StrategyKind>,
    /// Minimum success rate for `performance` and `cost_optimized` preference
    #[serde(default = "default_success_rate_floor")]
    pub success_rate_floor: f64,
    /// Cap on the number of fallback models in a decision
    #[serde(default)]
    pub max_fallbacks: Option<usize>,
    /// Offer open-circuit models when nothing else can serve the use case
    #[serde(default)]
    pub open_circuit_last_resort: bool,
    /// Window over which traffic share is measured for load balancing
    #[serde(default = "default_traffic_window", deserialize_with = "crate::duration::deserialize")]
    pub traffic_window: Duration,
    /// Samples at which a model's statistics are considered fully reliable
    #[serde(default = "default_confidence_samples")]
    pub confidence_samples: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            use_cases: HashMap::new(),
            success_rate_floor: default_success_rate_floor(),
            max_fallbacks: None,
            open_circuit_last_resort: false,
            traffic_window: default_traffic_window(),
            confidence_samples: default_confidence_samples(),
        }
    }
}

impl RoutingConfig {
    /// Strategy for a use case, honouring a per-request override
    pub fn strategy_for(&self, use_case: &str, requested: Option<StrategyKind>) -> StrategyKind {
        requested
            .or_else(|| self.use_cases.get(use_case).copied())
            .unwrap_or(self.strategy)
    }
}

const fn default_success_rate_floor() -> f64 {
    0.9
}

const fn default_traffic_window() -> Duration {
    Duration::from_secs(5 * 60)
}

const fn default_confidence_samples() -> u64 {
    20
}
