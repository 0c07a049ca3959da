//! Confidence score for a routing decision
//!
//! Confidence is low when the data is sparse or when the top two
//! candidates cannot be told apart. It is the product of a sample factor
//! and a separation factor:
//!
//! - sample factor: `min(1, samples / confidence_samples)` using the
//!   smaller sample count of the two leading candidates
//! - separation: `0.5 + 0.5 * min(1, |rate gap| / 0.05)`
//!
//! A sole candidate is fully separated.

use crate::strategy::Candidate;

/// Success-rate gap at which two candidates count as clearly distinct
const DISTINCT_RATE_GAP: f64 = 0.05;

/// Score in `[0, 1]` for a ranked candidate list
pub fn score(ranked: &[Candidate<'_>], confidence_samples: u64) -> f64 {
    let Some(top) = ranked.first() else {
        return 0.0;
    };

    let (samples, separation) = match ranked.get(1) {
        Some(second) => {
            let gap = (top.success_rate() - second.success_rate()).abs();
            (
                top.health.sample_count.min(second.health.sample_count),
                (gap / DISTINCT_RATE_GAP).clamp(0.0, 1.0),
            )
        }
        None => (top.health.sample_count, 1.0),
    };

    #[allow(clippy::cast_precision_loss)]
    let sample_factor = if confidence_samples == 0 {
        1.0
    } else {
        (samples as f64 / confidence_samples as f64).min(1.0)
    };

    (sample_factor * 0.5f64.mul_add(separation, 0.5)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::*;

    #[test]
    fn empty_ranking_has_no_confidence() {
        assert!(score(&[], 20).abs() < f64::EPSILON);
    }

    #[test]
    fn sparse_data_lowers_confidence() {
        let (a, b) = (profile("a", 0.0), profile("b", 0.0));
        let mut top = candidate(&a, 1.0, 100.0);
        top.health.sample_count = 5;
        let second = candidate(&b, 0.5, 100.0);

        assert!((score(&[top, second], 20) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn indistinguishable_candidates_halve_confidence() {
        let (a, b) = (profile("a", 0.0), profile("b", 0.0));
        let ranked = [candidate(&a, 0.95, 100.0), candidate(&b, 0.95, 90.0)];

        assert!((score(&ranked, 20) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn clear_winner_with_enough_data_is_certain() {
        let (a, b) = (profile("a", 0.0), profile("b", 0.0));
        let ranked = [candidate(&a, 0.99, 200.0), candidate(&b, 0.9, 150.0)];

        assert!((score(&ranked, 20) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn sole_candidate_depends_on_samples_only() {
        let a = profile("a", 0.0);
        let mut only = candidate(&a, 0.7, 100.0);
        only.health.sample_count = 10;

        assert!((score(&[only], 20) - 0.5).abs() < 1e-9);
    }
}
