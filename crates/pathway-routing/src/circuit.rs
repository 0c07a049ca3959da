//! Per-model circuit breakers
//!
//! `closed` admits everything. After `failure_threshold` failures without a
//! success the circuit opens and refuses requests for an exponentially
//! growing backoff. Once the backoff elapses the circuit is `half_open` and
//! admits exactly one trial; the trial's outcome closes or re-opens it.
//!
//! Results from callers that did not hold the trial never settle a claimed
//! trial. While the trial is in flight they only count failures. A
//! half-open circuit with no trial in flight accepts any result as its
//! verdict, so outcomes reported from outside still recover it.
//!
//! The open to half-open transition is applied lazily by whichever call
//! observes the elapsed backoff first, under the model's lock.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use pathway_config::CircuitBreakerConfig;
use serde::Serialize;

use crate::outcome::now_millis;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, all requests admitted
    Closed,
    /// Requests refused until the backoff elapses
    Open,
    /// A single trial request is admitted
    HalfOpen,
}

/// A state change observed while admitting or recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitTransition {
    pub model_id: String,
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Result of asking a circuit for admission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Whether the caller may send a request to the model
    pub allowed: bool,
    /// Whether the admission claimed the half-open trial slot
    pub trial: bool,
    /// Transitions applied while deciding
    pub transitions: Vec<CircuitTransition>,
}

/// Serializable view of one model's circuit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub model_id: String,
    pub state: CircuitState,
    /// Failures since the last success
    pub failure_count: u32,
    pub failure_threshold: u32,
    /// Consecutive trips without an intervening close
    pub open_count: u32,
    pub trial_in_flight: bool,
    /// Time until an open circuit admits a trial
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_in_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_opened_at_ms: Option<u64>,
}

#[derive(Debug)]
struct ModelCircuit {
    state: CircuitState,
    failure_count: u32,
    open_count: u32,
    next_retry: Option<Instant>,
    trial_in_flight: bool,
    last_opened_at_ms: Option<u64>,
}

impl ModelCircuit {
    const fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            open_count: 0,
            next_retry: None,
            trial_in_flight: false,
            last_opened_at_ms: None,
        }
    }

    /// State with any elapsed backoff applied, without mutating
    fn effective_state(&self, now: Instant) -> CircuitState {
        match (self.state, self.next_retry) {
            (CircuitState::Open, Some(retry)) if now >= retry => CircuitState::HalfOpen,
            (state, _) => state,
        }
    }

    /// Apply an elapsed backoff
    fn refresh(&mut self, now: Instant) -> Option<(CircuitState, CircuitState)> {
        let effective = self.effective_state(now);
        if effective == self.state {
            return None;
        }

        let from = self.state;
        self.state = effective;
        self.trial_in_flight = false;
        Some((from, effective))
    }

    fn trip(&mut self, config: &CircuitBreakerConfig, now: Instant) {
        self.open_count = self.open_count.saturating_add(1);
        self.state = CircuitState::Open;
        self.next_retry = Some(now + config.backoff_for(self.open_count));
        self.trial_in_flight = false;
        self.last_opened_at_ms = Some(now_millis());
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.open_count = 0;
        self.next_retry = None;
        self.trial_in_flight = false;
    }

    fn snapshot(&self, model_id: &str, config: &CircuitBreakerConfig, now: Instant) -> CircuitSnapshot {
        let state = self.effective_state(now);
        let retry_in = match state {
            CircuitState::Open => self.next_retry.map(|retry| retry.saturating_duration_since(now)),
            CircuitState::Closed | CircuitState::HalfOpen => None,
        };

        CircuitSnapshot {
            model_id: model_id.to_owned(),
            state,
            failure_count: self.failure_count,
            failure_threshold: config.failure_threshold,
            open_count: self.open_count,
            trial_in_flight: state == CircuitState::HalfOpen && self.trial_in_flight,
            retry_in_ms: retry_in.map(millis),
            next_retry_at_ms: retry_in.map(|d| now_millis().saturating_add(millis(d))),
            last_opened_at_ms: self.last_opened_at_ms,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Circuit breakers for every model
pub struct CircuitBreakers {
    models: DashMap<String, Arc<Mutex<ModelCircuit>>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakers {
    /// Create breakers sharing one set of thresholds
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            models: DashMap::new(),
            config,
        }
    }

    /// Shared configuration
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn handle(&self, model_id: &str) -> Arc<Mutex<ModelCircuit>> {
        if let Some(existing) = self.models.get(model_id) {
            return Arc::clone(&existing);
        }

        let entry = self
            .models
            .entry(model_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(ModelCircuit::new())));
        Arc::clone(&entry)
    }

    fn transition(model_id: &str, change: Option<(CircuitState, CircuitState)>) -> Option<CircuitTransition> {
        change.map(|(from, to)| {
            tracing::info!(model_id, %from, %to, "circuit state changed");
            CircuitTransition {
                model_id: model_id.to_owned(),
                from,
                to,
            }
        })
    }

    /// Ask whether a request may be sent to the model
    ///
    /// A half-open circuit admits exactly one caller; the admission claims
    /// the trial slot until [`record_result`](Self::record_result) or
    /// [`release_trial`](Self::release_trial) is called.
    pub fn acquire(&self, model_id: &str) -> Admission {
        let handle = self.handle(model_id);
        let mut circuit = handle.lock().unwrap_or_else(|e| e.into_inner());
        let transitions: Vec<_> = Self::transition(model_id, circuit.refresh(Instant::now()))
            .into_iter()
            .collect();

        let (allowed, trial) = match circuit.state {
            CircuitState::Closed => (true, false),
            CircuitState::Open => (false, false),
            CircuitState::HalfOpen if circuit.trial_in_flight => (false, false),
            CircuitState::HalfOpen => {
                circuit.trial_in_flight = true;
                (true, true)
            }
        };

        Admission {
            allowed,
            trial,
            transitions,
        }
    }

    /// Shorthand for [`acquire`](Self::acquire) when transitions are not needed
    pub fn allow_request(&self, model_id: &str) -> bool {
        self.acquire(model_id).allowed
    }

    /// Give back a claimed trial slot without recording an outcome
    pub fn release_trial(&self, model_id: &str) {
        let Some(handle) = self.models.get(model_id).map(|h| Arc::clone(&h)) else {
            return;
        };

        let mut circuit = handle.lock().unwrap_or_else(|e| e.into_inner());
        if circuit.state == CircuitState::HalfOpen {
            circuit.trial_in_flight = false;
        }
    }

    /// Feed an attempt result into the model's circuit
    ///
    /// `trial` must be true only for the result of a call admitted with
    /// [`Admission::trial`] set.
    pub fn record_result(&self, model_id: &str, success: bool, trial: bool) -> Vec<CircuitTransition> {
        let handle = self.handle(model_id);
        let mut circuit = handle.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        let mut changes = vec![circuit.refresh(now)];
        let before = circuit.state;
        let verdict = trial || !circuit.trial_in_flight;

        match (circuit.state, success) {
            (CircuitState::Closed, true) => circuit.failure_count = 0,
            (CircuitState::Closed, false) => {
                circuit.failure_count = circuit.failure_count.saturating_add(1);
                if circuit.failure_count >= self.config.failure_threshold {
                    circuit.trip(&self.config, now);
                    tracing::warn!(
                        model_id,
                        failures = circuit.failure_count,
                        open_count = circuit.open_count,
                        "circuit opened"
                    );
                }
            }
            (CircuitState::HalfOpen, true) if verdict => circuit.close(),
            (CircuitState::HalfOpen, false) if verdict => {
                circuit.failure_count = circuit.failure_count.saturating_add(1);
                circuit.trip(&self.config, now);
                tracing::warn!(model_id, open_count = circuit.open_count, "trial request failed, circuit re-opened");
            }
            // Stray results while a trial is in flight, or late results for
            // an open circuit, are counted but never change state
            (CircuitState::HalfOpen | CircuitState::Open, true) => {}
            (CircuitState::HalfOpen | CircuitState::Open, false) => {
                circuit.failure_count = circuit.failure_count.saturating_add(1);
            }
        }

        if circuit.state != before {
            changes.push(Some((before, circuit.state)));
        }

        changes
            .into_iter()
            .filter_map(|change| Self::transition(model_id, change))
            .collect()
    }

    /// Effective state of a model's circuit
    pub fn state(&self, model_id: &str) -> CircuitState {
        self.models.get(model_id).map(|h| Arc::clone(&h)).map_or(CircuitState::Closed, |handle| {
            handle
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .effective_state(Instant::now())
        })
    }

    /// Detailed view of a model's circuit
    pub fn snapshot(&self, model_id: &str) -> CircuitSnapshot {
        let now = Instant::now();
        match self.models.get(model_id).map(|h| Arc::clone(&h)) {
            Some(handle) => handle
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .snapshot(model_id, &self.config, now),
            None => ModelCircuit::new().snapshot(model_id, &self.config, now),
        }
    }

    /// Snapshots of every model that has a circuit
    pub fn all(&self) -> BTreeMap<String, CircuitSnapshot> {
        let ids: Vec<String> = self.models.iter().map(|entry| entry.key().clone()).collect();
        ids.into_iter()
            .map(|id| {
                let snapshot = self.snapshot(&id);
                (id, snapshot)
            })
            .collect()
    }

    /// Force a model's circuit back to closed with a clean slate
    pub fn reset(&self, model_id: &str) -> Option<CircuitTransition> {
        let handle = self.models.get(model_id).map(|h| Arc::clone(&h))?;
        let mut circuit = handle.lock().unwrap_or_else(|e| e.into_inner());

        let from = circuit.effective_state(Instant::now());
        *circuit = ModelCircuit::new();
        drop(circuit);

        if from == CircuitState::Closed {
            None
        } else {
            Self::transition(model_id, Some((from, CircuitState::Closed)))
        }
    }
}

#[cfg(test)]
impl CircuitBreakers {
    /// Pretend the backoff already elapsed
    pub(crate) fn expire_backoff_for_test(&self, model_id: &str) {
        let handle = self.handle(model_id);
        let mut circuit = handle.lock().unwrap();
        circuit.next_retry = Instant::now().checked_sub(Duration::from_millis(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakers(threshold: u32) -> CircuitBreakers {
        CircuitBreakers::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            base_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(600),
        })
    }

    fn expire_backoff(breakers: &CircuitBreakers, model_id: &str) {
        breakers.expire_backoff_for_test(model_id);
    }

    fn trip(breakers: &CircuitBreakers, model_id: &str) {
        for _ in 0..breakers.config().failure_threshold {
            breakers.record_result(model_id, false, false);
        }
    }

    #[test]
    fn unknown_model_is_closed() {
        let breakers = breakers(3);
        assert_eq!(breakers.state("m"), CircuitState::Closed);
        assert!(breakers.allow_request("m"));
    }

    #[test]
    fn opens_at_threshold() {
        let breakers = breakers(3);

        assert!(breakers.record_result("m", false, false).is_empty());
        assert!(breakers.record_result("m", false, false).is_empty());
        let transitions = breakers.record_result("m", false, false);

        assert_eq!(
            transitions,
            [CircuitTransition {
                model_id: "m".to_owned(),
                from: CircuitState::Closed,
                to: CircuitState::Open,
            }]
        );
        assert_eq!(breakers.state("m"), CircuitState::Open);
        assert!(!breakers.allow_request("m"));

        let snapshot = breakers.snapshot("m");
        assert_eq!(snapshot.open_count, 1);
        assert!(snapshot.retry_in_ms.unwrap() <= 30_000);
        assert!(snapshot.last_opened_at_ms.is_some());
    }

    #[test]
    fn success_resets_failure_count() {
        let breakers = breakers(3);
        breakers.record_result("m", false, false);
        breakers.record_result("m", false, false);
        breakers.record_result("m", true, false);
        breakers.record_result("m", false, false);
        breakers.record_result("m", false, false);

        assert_eq!(breakers.state("m"), CircuitState::Closed);
        assert_eq!(breakers.snapshot("m").failure_count, 2);
    }

    #[test]
    fn half_open_admits_single_trial() {
        let breakers = breakers(2);
        trip(&breakers, "m");
        expire_backoff(&breakers, "m");

        assert_eq!(breakers.state("m"), CircuitState::HalfOpen);

        let first = breakers.acquire("m");
        assert!(first.allowed);
        assert!(first.trial);
        assert_eq!(first.transitions.len(), 1);
        assert_eq!(first.transitions[0].to, CircuitState::HalfOpen);

        assert!(!breakers.allow_request("m"));
        assert!(breakers.snapshot("m").trial_in_flight);

        breakers.release_trial("m");
        assert!(breakers.allow_request("m"));
    }

    #[test]
    fn successful_trial_closes() {
        let breakers = breakers(2);
        trip(&breakers, "m");
        expire_backoff(&breakers, "m");
        assert!(breakers.acquire("m").trial);

        let transitions = breakers.record_result("m", true, true);
        assert_eq!(transitions.last().unwrap().to, CircuitState::Closed);

        let snapshot = breakers.snapshot("m");
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.open_count, 0);
    }

    #[test]
    fn failed_trial_reopens_with_longer_backoff() {
        let breakers = breakers(2);
        trip(&breakers, "m");
        expire_backoff(&breakers, "m");
        assert!(breakers.acquire("m").trial);

        let transitions = breakers.record_result("m", false, true);
        assert_eq!(transitions.last().unwrap().from, CircuitState::HalfOpen);
        assert_eq!(transitions.last().unwrap().to, CircuitState::Open);

        let snapshot = breakers.snapshot("m");
        assert_eq!(snapshot.open_count, 2);
        assert!(snapshot.retry_in_ms.unwrap() > 30_000);
        assert!(snapshot.retry_in_ms.unwrap() <= 60_000);
    }

    #[test]
    fn lazy_transition_is_reported_on_record() {
        let breakers = breakers(1);
        trip(&breakers, "m");
        expire_backoff(&breakers, "m");

        let transitions = breakers.record_result("m", true, false);
        let states: Vec<_> = transitions.iter().map(|t| (t.from, t.to)).collect();
        assert_eq!(
            states,
            [
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }

    #[test]
    fn late_success_does_not_close_open_circuit() {
        let breakers = breakers(2);
        trip(&breakers, "m");

        assert!(breakers.record_result("m", true, false).is_empty());
        assert_eq!(breakers.state("m"), CircuitState::Open);

        breakers.record_result("m", false, false);
        assert_eq!(breakers.snapshot("m").failure_count, 3);
        assert_eq!(breakers.snapshot("m").open_count, 1);
    }

    #[test]
    fn stray_failure_does_not_settle_trial() {
        let breakers = breakers(2);
        trip(&breakers, "m");
        expire_backoff(&breakers, "m");
        assert!(breakers.acquire("m").trial);

        assert!(breakers.record_result("m", false, false).is_empty());
        let snapshot = breakers.snapshot("m");
        assert_eq!(snapshot.state, CircuitState::HalfOpen);
        assert_eq!(snapshot.open_count, 1);
        assert!(snapshot.trial_in_flight);

        let transitions = breakers.record_result("m", true, true);
        assert_eq!(transitions.last().unwrap().to, CircuitState::Closed);
        assert_eq!(breakers.state("m"), CircuitState::Closed);
    }

    #[test]
    fn stray_success_keeps_trial_slot_claimed() {
        let breakers = breakers(2);
        trip(&breakers, "m");
        expire_backoff(&breakers, "m");
        assert!(breakers.acquire("m").trial);

        assert!(breakers.record_result("m", true, false).is_empty());
        let snapshot = breakers.snapshot("m");
        assert_eq!(snapshot.state, CircuitState::HalfOpen);
        assert!(snapshot.trial_in_flight);
        assert!(!breakers.allow_request("m"));

        breakers.record_result("m", false, true);
        assert_eq!(breakers.state("m"), CircuitState::Open);
        assert_eq!(breakers.snapshot("m").open_count, 2);
    }

    #[test]
    fn unclaimed_half_open_accepts_reported_result() {
        let breakers = breakers(2);
        trip(&breakers, "m");
        expire_backoff(&breakers, "m");

        breakers.record_result("m", true, false);
        assert_eq!(breakers.state("m"), CircuitState::Closed);
    }

    #[test]
    fn reset_closes() {
        let breakers = breakers(1);
        trip(&breakers, "m");

        let transition = breakers.reset("m").unwrap();
        assert_eq!(transition.from, CircuitState::Open);
        assert_eq!(breakers.state("m"), CircuitState::Closed);
        assert!(breakers.reset("m").is_none());
        assert!(breakers.reset("unknown").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_trial() {
        let breakers = Arc::new(breakers(1));
        trip(&breakers, "m");
        expire_backoff(&breakers, "m");

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let breakers = Arc::clone(&breakers);
                tokio::spawn(async move { breakers.allow_request("m") })
            })
            .collect();

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 1);
    }
}
