//! Turning a use case into a ranked fallback chain

use pathway_config::StrategyKind;

use crate::circuit::CircuitState;
use crate::confidence;
use crate::error::RoutingError;
use crate::events::RoutingEvent;
use crate::outcome::now_millis;
use crate::state::RouterState;
use crate::strategy::{Candidate, by_reliability};
use crate::{RoutingContext, RoutingDecision, RoutingReason};

impl RouterState {
    /// Choose a primary model and ordered fallbacks for a use case
    ///
    /// Open-circuit and disabled models are never ranked. Routing is
    /// read-only: it does not claim half-open trials.
    pub fn route(&self, use_case: &str, context: &RoutingContext) -> Result<RoutingDecision, RoutingError> {
        let capable = self.registry.supporting(use_case);
        if capable.is_empty() {
            return Err(RoutingError::NoRoute {
                use_case: use_case.to_owned(),
            });
        }

        let kind = self.routing.strategy_for(use_case, context.strategy);
        let strategy = self
            .strategies
            .get(kind)
            .ok_or_else(|| RoutingError::UnknownStrategy {
                strategy: kind.to_string(),
            })?;

        let shares = self.traffic.shares();
        let mut eligible = Vec::with_capacity(capable.len());
        let mut open = Vec::new();

        for profile in capable {
            if self.health.is_disabled(&profile.id) {
                continue;
            }

            let candidate = Candidate {
                profile,
                health: self.health.get_health(&profile.id),
                circuit: self.circuits.state(&profile.id),
                traffic_share: shares.get(&profile.id).copied().unwrap_or(0.0),
            };

            if candidate.circuit == CircuitState::Open {
                open.push(candidate);
            } else {
                eligible.push(candidate);
            }
        }

        let decision = if eligible.is_empty() {
            if !self.routing.open_circuit_last_resort || open.is_empty() {
                tracing::warn!(use_case, "every capable model is circuit-open or disabled");
                return Err(RoutingError::NoEligibleModel {
                    use_case: use_case.to_owned(),
                });
            }

            self.last_resort(use_case, kind, open)?
        } else {
            let floor = self.routing.success_rate_floor;
            let ranked = strategy.rank(eligible, floor);
            let confidence = confidence::score(&ranked, self.routing.confidence_samples);

            let reason = match (kind, ranked.first()) {
                (StrategyKind::Default, _) => strategy.reason(),
                (_, Some(top)) if top.meets_floor(floor) => strategy.reason(),
                _ => RoutingReason::BestAvailable,
            };

            self.decision(use_case, kind, &ranked, reason, confidence)?
        };

        tracing::debug!(
            use_case,
            strategy = %kind,
            ranker = strategy.name(),
            selected = %decision.selected_model,
            fallbacks = decision.fallback_models.len(),
            reason = %decision.reason,
            confidence = decision.confidence,
            "route selected"
        );

        self.publish(RoutingEvent::RouteSelected {
            use_case: use_case.to_owned(),
            selected_model: decision.selected_model.clone(),
            fallback_models: decision.fallback_models.clone(),
            strategy: kind,
            request_id: context.request_id.clone(),
            at_ms: now_millis(),
        });

        Ok(decision)
    }

    /// Decision over open-circuit models, most recently successful first
    fn last_resort(
        &self,
        use_case: &str,
        kind: StrategyKind,
        mut open: Vec<Candidate<'_>>,
    ) -> Result<RoutingDecision, RoutingError> {
        open.sort_by(|a, b| {
            b.health
                .last_success_at_ms
                .cmp(&a.health.last_success_at_ms)
                .then_with(|| by_reliability(a, b))
        });

        tracing::warn!(use_case, models = open.len(), "routing to open circuits as last resort");
        self.decision(use_case, kind, &open, RoutingReason::LastResort, 0.0)
    }

    fn decision(
        &self,
        use_case: &str,
        strategy: StrategyKind,
        ranked: &[Candidate<'_>],
        reason: RoutingReason,
        confidence: f64,
    ) -> Result<RoutingDecision, RoutingError> {
        let Some((top, rest)) = ranked.split_first() else {
            return Err(RoutingError::NoEligibleModel {
                use_case: use_case.to_owned(),
            });
        };

        let limit = self.routing.max_fallbacks.unwrap_or(usize::MAX);

        Ok(RoutingDecision {
            selected_model: top.profile.id.clone(),
            fallback_models: rest.iter().take(limit).map(|c| c.profile.id.clone()).collect(),
            reason,
            confidence,
            estimated_cost: top.profile.cost_per_request,
            estimated_response_time_ms: top.expected_latency_ms(),
            strategy,
            use_case: use_case.to_owned(),
        })
    }
}
