//! Cost-optimized strategy
//!
//! Picks the cheapest model whose success rate meets the configured floor.
//! Price ties go to the more reliable model. Anything below the floor is
//! only used after every model that meets it.

use super::{Candidate, Strategy, partition_by_floor};
use crate::RoutingReason;

/// Lowest cost among models meeting the success-rate floor
pub struct CostStrategy;

#[allow(clippy::unnecessary_literal_bound)]
impl Strategy for CostStrategy {
    fn rank<'a>(&self, candidates: Vec<Candidate<'a>>, floor: f64) -> Vec<Candidate<'a>> {
        let (mut above, below) = partition_by_floor(candidates, floor);
        above.sort_by(|a, b| {
            a.profile
                .cost_per_request
                .total_cmp(&b.profile.cost_per_request)
                .then_with(|| b.success_rate().total_cmp(&a.success_rate()))
        });
        above.extend(below);
        above
    }

    fn reason(&self) -> RoutingReason {
        RoutingReason::CheapestAboveFloor
    }

    fn name(&self) -> &str {
        "cost_optimized"
    }
}
