//! Periodic fleet health summary
//!
//! A background task walks every model on an interval and publishes a
//! [`HealthSummary`] through a watch channel. It never mutates router
//! state beyond the lazy circuit refresh a snapshot performs.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::circuit::CircuitState;
use crate::health::HealthStatus;
use crate::outcome::now_millis;
use crate::state::RouterState;

/// One model's line in the summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub model_id: String,
    pub status: HealthStatus,
    pub circuit: CircuitState,
    pub success_rate: f64,
    pub average_response_time_ms: f64,
    pub sample_count: usize,
}

/// Fleet-wide health counts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthSummary {
    pub generated_at_ms: u64,
    pub total_models: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub disabled: usize,
    pub open_circuits: usize,
    pub half_open_circuits: usize,
    pub models: Vec<ModelSummary>,
}

/// Summarize the current state of every registered model
pub fn summarize(state: &RouterState) -> HealthSummary {
    let health = state.health();
    let circuits = state.circuit_states();

    let mut summary = HealthSummary {
        generated_at_ms: now_millis(),
        total_models: health.len(),
        ..HealthSummary::default()
    };

    for (model_id, record) in health {
        let circuit = circuits
            .get(&model_id)
            .map_or(CircuitState::Closed, |snapshot| snapshot.state);

        match record.status {
            HealthStatus::Healthy => summary.healthy += 1,
            HealthStatus::Degraded => summary.degraded += 1,
            HealthStatus::Unhealthy => summary.unhealthy += 1,
            HealthStatus::Disabled => summary.disabled += 1,
        }
        match circuit {
            CircuitState::Open => summary.open_circuits += 1,
            CircuitState::HalfOpen => summary.half_open_circuits += 1,
            CircuitState::Closed => {}
        }

        summary.models.push(ModelSummary {
            model_id,
            status: record.status,
            circuit,
            success_rate: record.success_rate,
            average_response_time_ms: record.average_response_time_ms,
            sample_count: record.sample_count,
        });
    }

    summary
}

/// Spawn the sweep task
///
/// The first summary is computed synchronously so the receiver is never
/// empty. The task stops when `shutdown` is cancelled.
pub fn spawn(
    state: Arc<RouterState>,
    interval: Duration,
    shutdown: CancellationToken,
) -> watch::Receiver<HealthSummary> {
    let (tx, rx) = watch::channel(summarize(&state));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let summary = summarize(&state);
            if summary.unhealthy > 0 || summary.open_circuits > 0 {
                tracing::warn!(
                    unhealthy = summary.unhealthy,
                    open_circuits = summary.open_circuits,
                    total = summary.total_models,
                    "model fleet degraded"
                );
            } else {
                tracing::debug!(total = summary.total_models, "health sweep complete");
            }

            if tx.send(summary).is_err() {
                break;
            }
        }

        tracing::debug!("health sweep stopped");
    });

    rx
}
