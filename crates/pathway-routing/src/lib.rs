//! Health-aware model routing
//!
//! Tracks rolling health and circuit state per model and turns a use case
//! into an ordered fallback chain using a pluggable ranking strategy.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod circuit;
pub mod confidence;
pub mod error;
pub mod events;
pub mod health;
pub mod history;
pub mod outcome;
pub mod registry;
mod router;
pub mod state;
pub mod strategy;
pub mod sweep;
pub mod traffic;

pub use circuit::{Admission, CircuitSnapshot, CircuitState, CircuitTransition};
pub use error::RoutingError;
pub use events::RoutingEvent;
pub use health::{HealthRecord, HealthStatus};
pub use outcome::{ErrorType, RequestOutcome};
pub use registry::{ModelProfile, ModelRegistry};
pub use state::RouterState;
pub use sweep::HealthSummary;

use pathway_config::StrategyKind;
use serde::{Deserialize, Serialize};

/// Why the selected model was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoutingReason {
    /// Highest recent success rate
    HighestSuccessRate,
    /// Lowest latency among models meeting the success-rate floor
    FastestAboveFloor,
    /// Lowest cost among models meeting the success-rate floor
    CheapestAboveFloor,
    /// Weighted random pick favouring lightly used models
    LoadBalanced,
    /// No model met the success-rate floor; the most reliable was taken
    BestAvailable,
    /// Every capable model is circuit-open
    LastResort,
}

/// Per-request routing inputs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutingContext {
    /// Strategy override for this request
    #[serde(default)]
    pub strategy: Option<StrategyKind>,
    /// Request identifier carried into events
    #[serde(default)]
    pub request_id: Option<String>,
}

impl RoutingContext {
    #[must_use]
    pub const fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = Some(strategy);
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Result of routing a use case
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    /// Model to try first
    pub selected_model: String,
    /// Models to try next, in order
    pub fallback_models: Vec<String>,
    pub reason: RoutingReason,
    /// How sure the router is about the ranking, in `[0, 1]`
    pub confidence: f64,
    /// Cost of one request to the selected model
    pub estimated_cost: f64,
    /// Expected latency of the selected model
    pub estimated_response_time_ms: f64,
    /// Strategy that produced the ranking
    pub strategy: StrategyKind,
    pub use_case: String,
}

impl RoutingDecision {
    /// Selected model followed by the fallbacks
    pub fn chain(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.selected_model.as_str()).chain(self.fallback_models.iter().map(String::as_str))
    }
}
