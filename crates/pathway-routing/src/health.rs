//! Rolling per-model health tracking
//!
//! Each model keeps a bounded window of recent outcomes (by count and by
//! age). Aggregates are recomputed from the raw window on every write, so
//! the same set of events always produces the same statistics regardless
//! of arrival order.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use pathway_config::HealthConfig;
use serde::Serialize;

use crate::outcome::RequestOutcome;

/// Derived health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    /// Taken out of rotation by an administrator
    Disabled,
}

/// Read-only snapshot of a model's recent reliability and latency
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthRecord {
    pub model_id: String,
    /// Successes divided by outcomes in the window (1.0 when empty)
    pub success_rate: f64,
    /// Mean latency of outcomes in the window
    pub average_response_time_ms: f64,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Outcomes currently in the window
    pub sample_count: usize,
    /// Outcomes recorded since the last reset
    pub total_requests: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_at_ms: Option<u64>,
    pub status: HealthStatus,
}

impl HealthRecord {
    fn unseen(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_owned(),
            success_rate: 1.0,
            average_response_time_ms: 0.0,
            consecutive_failures: 0,
            sample_count: 0,
            total_requests: 0,
            last_success_at_ms: None,
            last_failure_at_ms: None,
            status: HealthStatus::Healthy,
        }
    }
}

/// Aggregate `(success, latency_ms)` samples into `(success_rate, mean_latency_ms)`
///
/// Order-independent; an empty input yields `(1.0, 0.0)`.
pub fn aggregate<I>(samples: I) -> (f64, f64)
where
    I: IntoIterator<Item = (bool, u64)>,
{
    let (count, successes, latency_total) = samples
        .into_iter()
        .fold((0u64, 0u64, 0u128), |(count, ok, total), (success, latency)| {
            (count + 1, ok + u64::from(success), total + u128::from(latency))
        });

    if count == 0 {
        return (1.0, 0.0);
    }

    #[allow(clippy::cast_precision_loss)]
    let result = (successes as f64 / count as f64, latency_total as f64 / count as f64);
    result
}

struct Sample {
    success: bool,
    latency_ms: u64,
    at: Instant,
}

struct ModelHealth {
    window: VecDeque<Sample>,
    consecutive_failures: u32,
    total_requests: u64,
    last_success_at_ms: Option<u64>,
    last_failure_at_ms: Option<u64>,
    disabled: bool,
}

impl ModelHealth {
    const fn new() -> Self {
        Self {
            window: VecDeque::new(),
            consecutive_failures: 0,
            total_requests: 0,
            last_success_at_ms: None,
            last_failure_at_ms: None,
            disabled: false,
        }
    }

    fn evict(&mut self, max_len: usize, max_age: Duration, now: Instant) {
        while self.window.len() > max_len {
            self.window.pop_front();
        }
        while self
            .window
            .front()
            .is_some_and(|s| now.saturating_duration_since(s.at) > max_age)
        {
            self.window.pop_front();
        }
    }

    fn snapshot(&self, model_id: &str, config: &HealthConfig) -> HealthRecord {
        let (success_rate, average_response_time_ms) =
            aggregate(self.window.iter().map(|s| (s.success, s.latency_ms)));

        HealthRecord {
            model_id: model_id.to_owned(),
            success_rate,
            average_response_time_ms,
            consecutive_failures: self.consecutive_failures,
            sample_count: self.window.len(),
            total_requests: self.total_requests,
            last_success_at_ms: self.last_success_at_ms,
            last_failure_at_ms: self.last_failure_at_ms,
            status: derive_status(
                config,
                success_rate,
                self.consecutive_failures,
                self.window.is_empty(),
                self.disabled,
            ),
        }
    }
}

/// Classify a model from its aggregates
fn derive_status(
    config: &HealthConfig,
    success_rate: f64,
    consecutive_failures: u32,
    empty_window: bool,
    disabled: bool,
) -> HealthStatus {
    if disabled {
        HealthStatus::Disabled
    } else if empty_window && consecutive_failures == 0 {
        HealthStatus::Healthy
    } else if success_rate >= config.healthy_success_rate && consecutive_failures < config.max_consecutive_failures {
        HealthStatus::Healthy
    } else if success_rate >= config.degraded_success_rate {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    }
}

/// Track rolling health for every model
///
/// One lock per model; the map itself is only locked long enough to clone
/// the model's handle.
pub struct HealthTracker {
    models: DashMap<String, Arc<Mutex<ModelHealth>>>,
    config: HealthConfig,
}

impl HealthTracker {
    /// Create a tracker with the given window and thresholds
    pub fn new(config: HealthConfig) -> Self {
        Self {
            models: DashMap::new(),
            config,
        }
    }

    fn handle(&self, model_id: &str) -> Arc<Mutex<ModelHealth>> {
        if let Some(existing) = self.models.get(model_id) {
            return Arc::clone(&existing);
        }

        let entry = self
            .models
            .entry(model_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(ModelHealth::new())));
        Arc::clone(&entry)
    }

    /// Append an outcome to its model's window and return the new record
    pub fn record_outcome(&self, outcome: &RequestOutcome) -> HealthRecord {
        let handle = self.handle(&outcome.model_id);
        let mut health = handle.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        health.window.push_back(Sample {
            success: outcome.success,
            latency_ms: outcome.response_time_ms,
            at: now,
        });
        health.total_requests += 1;

        if outcome.success {
            health.consecutive_failures = 0;
            health.last_success_at_ms = Some(outcome.recorded_at_ms);
        } else {
            health.consecutive_failures = health.consecutive_failures.saturating_add(1);
            health.last_failure_at_ms = Some(outcome.recorded_at_ms);
        }

        health.evict(self.config.window_size, self.config.window_duration, now);
        health.snapshot(&outcome.model_id, &self.config)
    }

    /// Snapshot of a model's health; unseen models report as healthy
    pub fn get_health(&self, model_id: &str) -> HealthRecord {
        let Some(handle) = self.models.get(model_id).map(|h| Arc::clone(&h)) else {
            return HealthRecord::unseen(model_id);
        };

        let mut health = handle.lock().unwrap_or_else(|e| e.into_inner());
        health.evict(self.config.window_size, self.config.window_duration, Instant::now());
        health.snapshot(model_id, &self.config)
    }

    /// Snapshots for every model that has been seen
    pub fn all(&self) -> BTreeMap<String, HealthRecord> {
        let ids: Vec<String> = self.models.iter().map(|entry| entry.key().clone()).collect();
        ids.into_iter()
            .map(|id| {
                let record = self.get_health(&id);
                (id, record)
            })
            .collect()
    }

    /// Discard all recorded outcomes for a model
    ///
    /// The administrative disabled flag survives a reset.
    pub fn reset(&self, model_id: &str) {
        let Some(handle) = self.models.get(model_id).map(|h| Arc::clone(&h)) else {
            return;
        };

        let mut health = handle.lock().unwrap_or_else(|e| e.into_inner());
        let disabled = health.disabled;
        *health = ModelHealth::new();
        health.disabled = disabled;
        drop(health);

        tracing::info!(model_id, "health record reset");
    }

    /// Take a model out of rotation or put it back
    pub fn set_disabled(&self, model_id: &str, disabled: bool) {
        let handle = self.handle(model_id);
        handle.lock().unwrap_or_else(|e| e.into_inner()).disabled = disabled;
        tracing::info!(model_id, disabled, "model availability changed");
    }

    /// Whether an administrator disabled the model
    pub fn is_disabled(&self, model_id: &str) -> bool {
        self.models
            .get(model_id)
            .map(|h| Arc::clone(&h))
            .is_some_and(|handle| handle.lock().unwrap_or_else(|e| e.into_inner()).disabled)
    }
}
