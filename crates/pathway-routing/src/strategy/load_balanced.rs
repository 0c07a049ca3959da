//! Load-balanced strategy
//!
//! Orders models meeting the floor by a weighted random shuffle
//! (Efraimidis-Spirakis): each candidate draws `u^(1/w)` and the highest
//! key goes first. Weight is inversely proportional to the model's share
//! of recent traffic, so idle models are favoured without starving busy
//! ones.

use rand::Rng;

use super::{Candidate, Strategy, partition_by_floor};
use crate::RoutingReason;

/// Keeps a model with 100% of recent traffic selectable
const SHARE_SMOOTHING: f64 = 0.05;

/// Weighted random order favouring lightly used models
pub struct LoadBalancedStrategy;

/// Selection weight for a traffic share
pub fn weight(traffic_share: f64) -> f64 {
    1.0 / (traffic_share.clamp(0.0, 1.0) + SHARE_SMOOTHING)
}

/// Shuffle candidates with the given random source
pub fn shuffle<'a, R: Rng + ?Sized>(candidates: Vec<Candidate<'a>>, rng: &mut R) -> Vec<Candidate<'a>> {
    let mut keyed: Vec<(f64, Candidate<'a>)> = candidates
        .into_iter()
        .map(|c| {
            let u: f64 = rng.random();
            (u.powf(1.0 / weight(c.traffic_share)), c)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| b.total_cmp(a));
    keyed.into_iter().map(|(_, c)| c).collect()
}

#[allow(clippy::unnecessary_literal_bound)]
impl Strategy for LoadBalancedStrategy {
    fn rank<'a>(&self, candidates: Vec<Candidate<'a>>, floor: f64) -> Vec<Candidate<'a>> {
        let (above, below) = partition_by_floor(candidates, floor);
        let mut ranked = shuffle(above, &mut rand::rng());
        ranked.extend(below);
        ranked
    }

    fn reason(&self) -> RoutingReason {
        RoutingReason::LoadBalanced
    }

    fn name(&self) -> &str {
        "load_balanced"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::strategy::test_support::*;

    #[test]
    fn idle_models_weigh_more() {
        assert!(weight(0.0) > weight(0.5));
        assert!(weight(0.5) > weight(1.0));
        assert!(weight(1.0).is_finite());
    }

    #[test]
    fn favours_lightly_used_model() {
        let (busy, idle) = (profile("busy", 0.0), profile("idle", 0.0));
        let mut rng = StdRng::seed_from_u64(7);
        let mut firsts: HashMap<String, u32> = HashMap::new();

        for _ in 0..2000 {
            let mut a = candidate(&busy, 0.99, 100.0);
            a.traffic_share = 0.9;
            let mut b = candidate(&idle, 0.99, 100.0);
            b.traffic_share = 0.1;

            let ranked = shuffle(vec![a, b], &mut rng);
            *firsts.entry(ranked[0].profile.id.clone()).or_default() += 1;
        }

        let idle_first = firsts.get("idle").copied().unwrap_or(0);
        let busy_first = firsts.get("busy").copied().unwrap_or(0);
        assert!(idle_first > busy_first * 2, "idle={idle_first} busy={busy_first}");
        assert!(busy_first > 0);
    }

    #[test]
    fn below_floor_models_stay_last() {
        let (a, b, c) = (profile("a", 0.0), profile("b", 0.0), profile("c", 0.0));
        for _ in 0..50 {
            let ranked = LoadBalancedStrategy.rank(
                vec![candidate(&a, 0.5, 1.0), candidate(&b, 0.95, 1.0), candidate(&c, 0.97, 1.0)],
                0.9,
            );
            assert_eq!(ranked.last().unwrap().profile.id, "a");
            assert_eq!(ranked.len(), 3);
        }
    }
}
