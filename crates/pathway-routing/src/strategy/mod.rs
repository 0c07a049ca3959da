//! Candidate ranking strategies

use std::cmp::Ordering;
use std::collections::HashMap;

use pathway_config::StrategyKind;

use crate::RoutingReason;
use crate::circuit::CircuitState;
use crate::health::HealthRecord;
use crate::registry::ModelProfile;

pub mod cost;
pub mod load_balanced;
pub mod performance;
pub mod reliability;

/// A capable, eligible model together with the live data used to rank it
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub profile: &'a ModelProfile,
    pub health: HealthRecord,
    pub circuit: CircuitState,
    /// Fraction of recent traffic the model received
    pub traffic_share: f64,
}

impl Candidate<'_> {
    /// Observed mean latency, or the configured timeout for unseen models
    pub fn expected_latency_ms(&self) -> f64 {
        if self.health.sample_count == 0 {
            self.profile.timeout_ms()
        } else {
            self.health.average_response_time_ms
        }
    }

    pub fn success_rate(&self) -> f64 {
        self.health.success_rate
    }

    pub fn meets_floor(&self, floor: f64) -> bool {
        self.success_rate() >= floor
    }
}

/// Trait for candidate ranking strategies
///
/// Implementations reorder candidates best first. They must not drop or
/// invent candidates.
#[allow(clippy::unnecessary_literal_bound)]
pub trait Strategy: Send + Sync {
    /// Order candidates best first
    fn rank<'a>(&self, candidates: Vec<Candidate<'a>>, floor: f64) -> Vec<Candidate<'a>>;

    /// Reason reported when the top candidate satisfies the strategy
    fn reason(&self) -> RoutingReason;

    /// Human-readable strategy name
    fn name(&self) -> &str;
}

/// Highest success rate first, then lowest expected latency
///
/// Equal candidates keep configuration order when used with a stable sort.
pub fn by_reliability(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    b.success_rate()
        .total_cmp(&a.success_rate())
        .then_with(|| a.expected_latency_ms().total_cmp(&b.expected_latency_ms()))
}

/// Split candidates into those meeting the floor and the rest
///
/// The below-floor group comes back in reliability order.
pub fn partition_by_floor<'a>(candidates: Vec<Candidate<'a>>, floor: f64) -> (Vec<Candidate<'a>>, Vec<Candidate<'a>>) {
    let (above, mut below): (Vec<_>, Vec<_>) = candidates.into_iter().partition(|c| c.meets_floor(floor));
    below.sort_by(by_reliability);
    (above, below)
}

/// Registry of available ranking strategies
pub struct StrategyRegistry {
    strategies: HashMap<StrategyKind, Box<dyn Strategy>>,
}

impl StrategyRegistry {
    /// Registry with every built-in strategy
    pub fn builtin() -> Self {
        let mut strategies: HashMap<StrategyKind, Box<dyn Strategy>> = HashMap::new();
        strategies.insert(StrategyKind::Default, Box::new(reliability::ReliabilityStrategy));
        strategies.insert(StrategyKind::Performance, Box::new(performance::PerformanceStrategy));
        strategies.insert(StrategyKind::CostOptimized, Box::new(cost::CostStrategy));
        strategies.insert(StrategyKind::LoadBalanced, Box::new(load_balanced::LoadBalancedStrategy));

        Self { strategies }
    }

    /// Replace the implementation behind a strategy kind
    pub fn register(&mut self, kind: StrategyKind, strategy: Box<dyn Strategy>) {
        self.strategies.insert(kind, strategy);
    }

    /// Get the implementation for a strategy kind
    pub fn get(&self, kind: StrategyKind) -> Option<&dyn Strategy> {
        self.strategies.get(&kind).map(AsRef::as_ref)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.strategies.keys().collect::<Vec<_>>())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn unseen_model_uses_timeout_as_latency() {
        let p = profile("m", 0.01);
        let mut c = candidate(&p, 1.0, 0.0);
        c.health.sample_count = 0;
        assert!((c.expected_latency_ms() - 10_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn partition_orders_below_floor_by_reliability() {
        let (a, b, c) = (profile("a", 0.0), profile("b", 0.0), profile("c", 0.0));
        let candidates = vec![candidate(&a, 0.5, 10.0), candidate(&b, 0.95, 10.0), candidate(&c, 0.8, 10.0)];

        let (above, below) = partition_by_floor(candidates, 0.9);
        assert_eq!(ids(&above), ["b"]);
        assert_eq!(ids(&below), ["c", "a"]);
    }

    #[test]
    fn builtin_registry_covers_every_kind() {
        let registry = StrategyRegistry::builtin();
        for kind in [
            StrategyKind::Default,
            StrategyKind::Performance,
            StrategyKind::CostOptimized,
            StrategyKind::LoadBalanced,
        ] {
            assert!(registry.get(kind).is_some(), "missing {kind}");
        }
    }

    #[test]
    fn custom_strategy_registration() {
        struct Reverse;

        #[allow(clippy::unnecessary_literal_bound)]
        impl Strategy for Reverse {
            fn rank<'a>(&self, mut candidates: Vec<Candidate<'a>>, _floor: f64) -> Vec<Candidate<'a>> {
                candidates.reverse();
                candidates
            }

            fn reason(&self) -> RoutingReason {
                RoutingReason::HighestSuccessRate
            }

            fn name(&self) -> &str {
                "reverse"
            }
        }

        let mut registry = StrategyRegistry::builtin();
        registry.register(StrategyKind::Default, Box::new(Reverse));

        let (a, b) = (profile("a", 0.0), profile("b", 0.0));
        let strategy = registry.get(StrategyKind::Default).unwrap();
        let ranked = strategy.rank(vec![candidate(&a, 1.0, 1.0), candidate(&b, 1.0, 1.0)], 0.9);

        assert_eq!(strategy.name(), "reverse");
        assert_eq!(ids(&ranked), ["b", "a"]);
    }
}
