//! Performance strategy: fastest model that is reliable enough

use super::{Candidate, Strategy, partition_by_floor};
use crate::RoutingReason;

/// Lowest latency among models meeting the success-rate floor
///
/// Models below the floor follow in reliability order.
pub struct PerformanceStrategy;

#[allow(clippy::unnecessary_literal_bound)]
impl Strategy for PerformanceStrategy {
    fn rank<'a>(&self, candidates: Vec<Candidate<'a>>, floor: f64) -> Vec<Candidate<'a>> {
        let (mut above, below) = partition_by_floor(candidates, floor);
        above.sort_by(|a, b| {
            a.expected_latency_ms()
                .total_cmp(&b.expected_latency_ms())
                .then_with(|| b.success_rate().total_cmp(&a.success_rate()))
        });
        above.extend(below);
        above
    }

    fn reason(&self) -> RoutingReason {
        RoutingReason::FastestAboveFloor
    }

    fn name(&self) -> &str {
        "performance"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::*;

    #[test]
    fn fastest_above_floor_wins() {
        let (a, b, c) = (profile("a", 0.0), profile("b", 0.0), profile("c", 0.0));
        let ranked = PerformanceStrategy.rank(
            vec![candidate(&a, 0.99, 200.0), candidate(&b, 0.9, 150.0), candidate(&c, 0.5, 20.0)],
            0.9,
        );
        assert_eq!(ids(&ranked), ["b", "a", "c"]);
    }
}
