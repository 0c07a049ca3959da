//! Default strategy: most reliable model first

use super::{Candidate, Strategy, by_reliability};
use crate::RoutingReason;

/// Highest success rate, ties broken by lowest latency
pub struct ReliabilityStrategy;

#[allow(clippy::unnecessary_literal_bound)]
impl Strategy for ReliabilityStrategy {
    fn rank<'a>(&self, mut candidates: Vec<Candidate<'a>>, _floor: f64) -> Vec<Candidate<'a>> {
        candidates.sort_by(by_reliability);
        candidates
    }

    fn reason(&self) -> RoutingReason {
        RoutingReason::HighestSuccessRate
    }

    fn name(&self) -> &str {
        "default"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::*;

    #[test]
    fn prefers_success_rate_over_latency() {
        let (a, b) = (profile("a", 0.0), profile("b", 0.0));
        let ranked = ReliabilityStrategy.rank(vec![candidate(&b, 0.9, 150.0), candidate(&a, 0.99, 200.0)], 0.9);
        assert_eq!(ids(&ranked), ["a", "b"]);
    }

    #[test]
    fn ties_break_on_latency_then_order() {
        let (a, b, c) = (profile("a", 0.0), profile("b", 0.0), profile("c", 0.0));
        let ranked = ReliabilityStrategy.rank(
            vec![candidate(&a, 0.95, 300.0), candidate(&b, 0.95, 100.0), candidate(&c, 0.95, 300.0)],
            0.9,
        );
        assert_eq!(ids(&ranked), ["b", "a", "c"]);
    }
}
