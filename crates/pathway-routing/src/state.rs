//! Shared router state

use std::collections::BTreeMap;

use pathway_config::{Config, RoutingConfig};
use tokio::sync::broadcast;

use crate::circuit::{Admission, CircuitBreakers, CircuitSnapshot, CircuitTransition};
use crate::error::RoutingError;
use crate::events::RoutingEvent;
use crate::health::{HealthRecord, HealthTracker};
use crate::history::OutcomeHistory;
use crate::outcome::{ErrorType, RequestOutcome, now_millis};
use crate::registry::{ModelProfile, ModelRegistry};
use crate::strategy::StrategyRegistry;
use crate::traffic::TrafficMeter;

/// Buffered events per subscriber before the slowest one starts lagging
const EVENT_CAPACITY: usize = 1024;

/// Everything the router knows about the model fleet
///
/// Created once at startup and shared behind an `Arc`. The registry is
/// read-only; health and circuit data are locked per model.
pub struct RouterState {
    pub(crate) registry: ModelRegistry,
    pub(crate) health: HealthTracker,
    pub(crate) circuits: CircuitBreakers,
    pub(crate) history: OutcomeHistory,
    pub(crate) traffic: TrafficMeter,
    pub(crate) strategies: StrategyRegistry,
    pub(crate) routing: RoutingConfig,
    events: broadcast::Sender<RoutingEvent>,
}

impl RouterState {
    /// Build router state from configuration
    pub fn from_config(config: &Config) -> Self {
        Self::with_strategies(config, StrategyRegistry::builtin())
    }

    /// Build router state with a custom strategy registry
    pub fn with_strategies(config: &Config, strategies: StrategyRegistry) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            registry: ModelRegistry::from_config(&config.models),
            health: HealthTracker::new(config.health.clone()),
            circuits: CircuitBreakers::new(config.circuit_breaker.clone()),
            history: OutcomeHistory::new(&config.history),
            traffic: TrafficMeter::new(config.routing.traffic_window),
            strategies,
            routing: config.routing.clone(),
            events,
        }
    }

    pub const fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub const fn routing_config(&self) -> &RoutingConfig {
        &self.routing
    }

    fn profile(&self, model_id: &str) -> Result<&ModelProfile, RoutingError> {
        self.registry.find(model_id).ok_or_else(|| RoutingError::UnknownModel {
            model_id: model_id.to_owned(),
        })
    }

    /// Subscribe to routing events
    pub fn subscribe(&self) -> broadcast::Receiver<RoutingEvent> {
        self.events.subscribe()
    }

    /// Broadcast an event to current subscribers
    pub fn publish(&self, event: RoutingEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    fn publish_transitions(&self, transitions: Vec<CircuitTransition>) {
        for transition in transitions {
            self.publish(RoutingEvent::CircuitChanged {
                model_id: transition.model_id,
                from: transition.from,
                to: transition.to,
                at_ms: now_millis(),
            });
        }
    }

    /// Ask the model's circuit for admission, claiming a half-open trial
    ///
    /// A caller holding the trial reports its result through
    /// [`record_attempt`](Self::record_attempt) with `trial` set, or gives
    /// the slot back with [`release_trial`](Self::release_trial).
    pub fn acquire(&self, model_id: &str) -> Admission {
        let mut admission = self.circuits.acquire(model_id);
        self.publish_transitions(std::mem::take(&mut admission.transitions));
        admission
    }

    /// Shorthand for [`acquire`](Self::acquire)
    pub fn allow_request(&self, model_id: &str) -> bool {
        self.acquire(model_id).allowed
    }

    /// Give back a trial slot claimed by [`acquire`](Self::acquire)
    pub fn release_trial(&self, model_id: &str) {
        self.circuits.release_trial(model_id);
    }

    /// Record the result of a model call
    ///
    /// Updates health, circuit state, traffic and history, and broadcasts
    /// the outcome.
    pub fn record_result(
        &self,
        model_id: &str,
        use_case: &str,
        response_time_ms: u64,
        success: bool,
        error_type: Option<ErrorType>,
        request_id: Option<String>,
    ) -> Result<(), RoutingError> {
        let outcome = if success {
            RequestOutcome::success(model_id, use_case, response_time_ms)
        } else {
            RequestOutcome::failure(model_id, use_case, response_time_ms, error_type.unwrap_or(ErrorType::Other))
        };

        self.record_outcome(outcome.with_request_id(request_id))
    }

    /// Record a prepared outcome reported from outside a trial
    pub fn record_outcome(&self, outcome: RequestOutcome) -> Result<(), RoutingError> {
        self.record_attempt(outcome, false)
    }

    /// Record the outcome of a call admitted by [`acquire`](Self::acquire)
    ///
    /// `trial` is the admission's trial flag; only the trial settles a
    /// half-open circuit that has one in flight.
    pub fn record_attempt(&self, outcome: RequestOutcome, trial: bool) -> Result<(), RoutingError> {
        self.profile(&outcome.model_id)?;

        let health = self.health.record_outcome(&outcome);
        let transitions = self.circuits.record_result(&outcome.model_id, outcome.success, trial);
        self.traffic.record(&outcome.model_id);

        tracing::debug!(
            model_id = %outcome.model_id,
            use_case = %outcome.use_case,
            success = outcome.success,
            trial,
            response_time_ms = outcome.response_time_ms,
            success_rate = health.success_rate,
            status = %health.status,
            "outcome recorded"
        );

        self.publish(RoutingEvent::OutcomeRecorded {
            model_id: outcome.model_id.clone(),
            use_case: outcome.use_case.clone(),
            success: outcome.success,
            response_time_ms: outcome.response_time_ms,
            error_type: outcome.error_type,
            request_id: outcome.request_id.clone(),
            at_ms: outcome.recorded_at_ms,
        });
        self.publish_transitions(transitions);
        self.history.push(outcome);

        Ok(())
    }

    /// Health of every registered model
    pub fn health(&self) -> BTreeMap<String, HealthRecord> {
        self.registry
            .profiles()
            .iter()
            .map(|p| (p.id.clone(), self.health.get_health(&p.id)))
            .collect()
    }

    /// Health of one registered model
    pub fn model_health(&self, model_id: &str) -> Result<HealthRecord, RoutingError> {
        self.profile(model_id)?;
        Ok(self.health.get_health(model_id))
    }

    /// Circuit state of every registered model
    pub fn circuit_states(&self) -> BTreeMap<String, CircuitSnapshot> {
        self.registry
            .profiles()
            .iter()
            .map(|p| (p.id.clone(), self.circuits.snapshot(&p.id)))
            .collect()
    }

    /// Most recent outcomes, newest first
    pub fn recent_outcomes(&self, limit: usize) -> Vec<RequestOutcome> {
        self.history.recent(limit)
    }

    /// Most recent outcomes of one model, newest first
    pub fn model_outcomes(&self, model_id: &str, limit: usize) -> Result<Vec<RequestOutcome>, RoutingError> {
        self.profile(model_id)?;
        Ok(self.history.for_model(model_id, limit))
    }

    /// Clear a model's health window and close its circuit
    pub fn reset_model(&self, model_id: &str) -> Result<(), RoutingError> {
        self.profile(model_id)?;

        self.health.reset(model_id);
        let transition = self.circuits.reset(model_id);
        self.publish_transitions(transition.into_iter().collect());
        self.publish(RoutingEvent::ModelReset {
            model_id: model_id.to_owned(),
            at_ms: now_millis(),
        });

        Ok(())
    }

    /// Take a model out of rotation or put it back
    pub fn set_disabled(&self, model_id: &str, disabled: bool) -> Result<(), RoutingError> {
        self.profile(model_id)?;

        self.health.set_disabled(model_id, disabled);
        self.publish(RoutingEvent::ModelAvailabilityChanged {
            model_id: model_id.to_owned(),
            disabled,
            at_ms: now_millis(),
        });

        Ok(())
    }

    pub fn is_disabled(&self, model_id: &str) -> bool {
        self.health.is_disabled(model_id)
    }
}

impl std::fmt::Debug for RouterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterState")
            .field("models", &self.registry.profiles().len())
            .field("strategies", &self.strategies)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::config;
    use super::*;
    use crate::circuit::CircuitState;
    use crate::health::HealthStatus;

    #[test]
    fn records_update_health_circuit_and_history() {
        let state = RouterState::from_config(&config(&[("a", &["quiz_generation"])]));

        for _ in 0..5 {
            state
                .record_result("a", "quiz_generation", 120, false, Some(ErrorType::Upstream), None)
                .unwrap();
        }

        let health = &state.health()["a"];
        assert_eq!(health.consecutive_failures, 5);
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(state.circuit_states()["a"].state, CircuitState::Open);
        assert_eq!(state.recent_outcomes(10).len(), 5);
        assert!(!state.allow_request("a"));
    }

    #[test]
    fn unknown_model_is_rejected() {
        let state = RouterState::from_config(&config(&[("a", &["quiz_generation"])]));

        let err = state
            .record_result("ghost", "quiz_generation", 1, true, None, None)
            .unwrap_err();
        assert_eq!(
            err,
            RoutingError::UnknownModel {
                model_id: "ghost".to_owned()
            }
        );
        assert!(state.reset_model("ghost").is_err());
    }

    #[test]
    fn reset_restores_clean_state() {
        let state = RouterState::from_config(&config(&[("a", &["quiz_generation"])]));
        for _ in 0..5 {
            state.record_result("a", "quiz_generation", 10, false, None, None).unwrap();
        }

        state.reset_model("a").unwrap();

        let health = &state.health()["a"];
        assert_eq!(health.total_requests, 0);
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(state.circuit_states()["a"].state, CircuitState::Closed);
        assert!(state.allow_request("a"));
    }

    #[test]
    fn unseen_models_are_listed() {
        let state = RouterState::from_config(&config(&[("a", &["quiz_generation"]), ("b", &["mathematics"])]));

        let health = state.health();
        assert_eq!(health.len(), 2);
        assert_eq!(health["b"].status, HealthStatus::Healthy);
        assert_eq!(state.circuit_states()["b"].state, CircuitState::Closed);
    }

    #[test]
    fn replaying_outcomes_reproduces_health() {
        let models: &[(&str, &[&str])] = &[("a", &["quiz_generation"])];
        let live = RouterState::from_config(&config(models));
        let replay = RouterState::from_config(&config(models));

        let pattern = [true, true, false, true, false, false, true, true];
        for (latency, &success) in (100..).step_by(10).zip(pattern.iter()) {
            live.record_result("a", "quiz_generation", latency, success, None, None)
                .unwrap();
        }

        let mut recorded = live.recent_outcomes(usize::MAX);
        recorded.reverse();
        for outcome in recorded {
            replay.record_outcome(outcome).unwrap();
        }

        let (live_health, replay_health) = (&live.health()["a"], &replay.health()["a"]);
        assert!((live_health.success_rate - replay_health.success_rate).abs() < 1e-12);
        assert!((live_health.average_response_time_ms - replay_health.average_response_time_ms).abs() < 1e-12);
        assert_eq!(live_health.consecutive_failures, replay_health.consecutive_failures);
        assert_eq!(live.circuit_states()["a"].state, replay.circuit_states()["a"].state);
    }

    #[test]
    fn reported_outcomes_leave_claimed_trial_alone() {
        let state = RouterState::from_config(&config(&[("a", &["quiz_generation"])]));
        for _ in 0..5 {
            state.record_result("a", "quiz_generation", 10, false, None, None).unwrap();
        }
        state.circuits.expire_backoff_for_test("a");

        let admission = state.acquire("a");
        assert!(admission.allowed && admission.trial);

        state.record_result("a", "quiz_generation", 10, true, None, None).unwrap();
        assert_eq!(state.circuit_states()["a"].state, CircuitState::HalfOpen);
        assert!(!state.allow_request("a"));

        state
            .record_attempt(RequestOutcome::success("a", "quiz_generation", 40), admission.trial)
            .unwrap();
        assert_eq!(state.circuit_states()["a"].state, CircuitState::Closed);
        assert!(state.allow_request("a"));
    }

    #[tokio::test]
    async fn broadcasts_outcomes_and_transitions() {
        let state = RouterState::from_config(&config(&[("a", &["quiz_generation"])]));
        let mut events = state.subscribe();

        for _ in 0..5 {
            state.record_result("a", "quiz_generation", 10, false, None, None).unwrap();
        }

        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            kinds.push(event.kind());
        }

        assert_eq!(kinds.iter().filter(|&&k| k == "outcome_recorded").count(), 5);
        assert_eq!(kinds.last(), Some(&"circuit_changed"));
    }
}
