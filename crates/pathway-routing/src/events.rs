//! Routing events broadcast to subscribers

use pathway_config::StrategyKind;
use serde::Serialize;

use crate::circuit::CircuitState;
use crate::outcome::{ErrorType, now_millis};

/// Something observable that happened inside the router
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoutingEvent {
    RouteSelected {
        use_case: String,
        selected_model: String,
        fallback_models: Vec<String>,
        strategy: StrategyKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        at_ms: u64,
    },
    AttemptStarted {
        model_id: String,
        use_case: String,
        attempt: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        at_ms: u64,
    },
    OutcomeRecorded {
        model_id: String,
        use_case: String,
        success: bool,
        response_time_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_type: Option<ErrorType>,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        at_ms: u64,
    },
    CircuitChanged {
        model_id: String,
        from: CircuitState,
        to: CircuitState,
        at_ms: u64,
    },
    ExecutionSucceeded {
        use_case: String,
        model_id: String,
        attempts: usize,
        cached: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        at_ms: u64,
    },
    ExecutionFailed {
        use_case: String,
        attempts: usize,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        at_ms: u64,
    },
    ModelReset {
        model_id: String,
        at_ms: u64,
    },
    ModelAvailabilityChanged {
        model_id: String,
        disabled: bool,
        at_ms: u64,
    },
}

impl RoutingEvent {
    /// Event name used as the SSE `event:` field
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RouteSelected { .. } => "route_selected",
            Self::AttemptStarted { .. } => "attempt_started",
            Self::OutcomeRecorded { .. } => "outcome_recorded",
            Self::CircuitChanged { .. } => "circuit_changed",
            Self::ExecutionSucceeded { .. } => "execution_succeeded",
            Self::ExecutionFailed { .. } => "execution_failed",
            Self::ModelReset { .. } => "model_reset",
            Self::ModelAvailabilityChanged { .. } => "model_availability_changed",
        }
    }

    pub fn attempt_started(model_id: &str, use_case: &str, attempt: usize, request_id: Option<&str>) -> Self {
        Self::AttemptStarted {
            model_id: model_id.to_owned(),
            use_case: use_case.to_owned(),
            attempt,
            request_id: request_id.map(str::to_owned),
            at_ms: now_millis(),
        }
    }

    pub fn execution_succeeded(
        use_case: &str,
        model_id: &str,
        attempts: usize,
        cached: bool,
        request_id: Option<&str>,
    ) -> Self {
        Self::ExecutionSucceeded {
            use_case: use_case.to_owned(),
            model_id: model_id.to_owned(),
            attempts,
            cached,
            request_id: request_id.map(str::to_owned),
            at_ms: now_millis(),
        }
    }

    pub fn execution_failed(use_case: &str, attempts: usize, error: String, request_id: Option<&str>) -> Self {
        Self::ExecutionFailed {
            use_case: use_case.to_owned(),
            attempts,
            error,
            request_id: request_id.map(str::to_owned),
            at_ms: now_millis(),
        }
    }
}
