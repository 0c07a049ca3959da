//! Routing, execution and reporting endpoints

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json, Router, routing};
use http::StatusCode;
use pathway_config::StrategyKind;
use pathway_core::RequestContext;
use pathway_llm::{AiRequest, ExecuteOptions, ExecutionOutput, Orchestrator};
use pathway_routing::sweep::{self, HealthSummary};
use pathway_routing::{
    CircuitSnapshot, ErrorType, HealthRecord, RequestOutcome, RouterState, RoutingContext, RoutingDecision,
};
use pathway_telemetry::metrics;
use pathway_telemetry::{Counter, KeyValue};
use serde::Deserialize;
use tokio::sync::watch;

use crate::error::ApiError;
use crate::events;

/// Most outcomes a single history query returns
const MAX_HISTORY_LIMIT: usize = 1000;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Latest sweep summary, when the sweep runs
    pub summary: Option<watch::Receiver<HealthSummary>>,
    route_count: Counter<u64>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, summary: Option<watch::Receiver<HealthSummary>>) -> Self {
        let route_count = metrics::meter()
            .u64_counter(metrics::ROUTE_COUNT)
            .with_description("Routing decisions served over HTTP")
            .build();

        Self {
            orchestrator,
            summary,
            route_count,
        }
    }

    pub fn router_state(&self) -> &RouterState {
        self.orchestrator.state()
    }
}

/// Build the API router
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/route", routing::post(route))
        .route("/v1/execute", routing::post(execute))
        .route("/v1/outcomes", routing::post(record_outcome).get(recent_outcomes))
        .route("/v1/models/health", routing::get(models_health))
        .route("/v1/models/circuits", routing::get(models_circuits))
        .route("/v1/models/{id}/health", routing::get(model_health))
        .route("/v1/models/{id}/outcomes", routing::get(model_outcomes))
        .route("/v1/summary", routing::get(summary))
        .route("/v1/admin/models/{id}/reset", routing::post(reset_model))
        .route("/v1/admin/models/{id}/disable", routing::post(disable_model))
        .route("/v1/admin/models/{id}/enable", routing::post(enable_model))
        .route("/v1/events", routing::get(events::events_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteBody {
    pub use_case: String,
    #[serde(default)]
    pub strategy: Option<StrategyKind>,
}

/// Handle `POST /v1/route`
async fn route(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(body): Json<RouteBody>,
) -> Result<Json<RoutingDecision>, ApiError> {
    let routing = RoutingContext {
        strategy: body.strategy,
        request_id: Some(context.request_id),
    };
    let decision = state.router_state().route(&body.use_case, &routing)?;

    state.route_count.add(
        1,
        &[
            KeyValue::new("use_case", body.use_case),
            KeyValue::new("strategy", decision.strategy.to_string()),
        ],
    );

    Ok(Json(decision))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecuteBody {
    pub request: AiRequest,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub max_attempts: Option<usize>,
    #[serde(default)]
    pub strategy: Option<StrategyKind>,
}

impl ExecuteBody {
    fn options(&self) -> Result<ExecuteOptions, ApiError> {
        if self.max_attempts == Some(0) {
            return Err(ApiError::BadRequest("max_attempts must be at least 1".to_owned()));
        }
        if self.timeout_ms == Some(0) {
            return Err(ApiError::BadRequest("timeout_ms must be positive".to_owned()));
        }

        Ok(ExecuteOptions {
            timeout: self.timeout_ms.map(Duration::from_millis),
            max_attempts: self.max_attempts,
            strategy: self.strategy,
        })
    }
}

/// Handle `POST /v1/execute`
async fn execute(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(body): Json<ExecuteBody>,
) -> Result<Json<ExecutionOutput>, ApiError> {
    let options = body.options()?;
    let output = state.orchestrator.execute(&body.request, &context, options).await?;
    Ok(Json(output))
}

/// Outcome reported by a caller that invoked a model itself
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutcomeBody {
    pub model_id: String,
    pub use_case: String,
    pub response_time_ms: u64,
    pub success: bool,
    #[serde(default)]
    pub error_type: Option<ErrorType>,
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Handle `POST /v1/outcomes`
async fn record_outcome(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(body): Json<OutcomeBody>,
) -> Result<(StatusCode, Json<HealthRecord>), ApiError> {
    if body.success && body.error_type.is_some() {
        return Err(ApiError::BadRequest("error_type is only valid for failed outcomes".to_owned()));
    }

    let router = state.router_state();
    router.record_result(
        &body.model_id,
        &body.use_case,
        body.response_time_ms,
        body.success,
        body.error_type,
        Some(body.request_id.unwrap_or(context.request_id)),
    )?;

    Ok((StatusCode::ACCEPTED, Json(router.model_health(&body.model_id)?)))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

const fn default_limit() -> usize {
    50
}

impl HistoryQuery {
    fn limit(&self) -> usize {
        self.limit.min(MAX_HISTORY_LIMIT)
    }
}

/// Handle `GET /v1/outcomes`
async fn recent_outcomes(State(state): State<AppState>, Query(query): Query<HistoryQuery>) -> Json<Vec<RequestOutcome>> {
    Json(state.router_state().recent_outcomes(query.limit()))
}

/// Handle `GET /v1/models/health`
async fn models_health(State(state): State<AppState>) -> Json<BTreeMap<String, HealthRecord>> {
    Json(state.router_state().health())
}

/// Handle `GET /v1/models/circuits`
async fn models_circuits(State(state): State<AppState>) -> Json<BTreeMap<String, CircuitSnapshot>> {
    Json(state.router_state().circuit_states())
}

async fn model_health(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<HealthRecord>, ApiError> {
    Ok(Json(state.router_state().model_health(&id)?))
}

async fn model_outcomes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<RequestOutcome>>, ApiError> {
    Ok(Json(state.router_state().model_outcomes(&id, query.limit())?))
}

/// Handle `GET /v1/summary`
///
/// Serves the last sweep result, or computes one when the sweep is off.
async fn summary(State(state): State<AppState>) -> Json<HealthSummary> {
    let summary = state
        .summary
        .as_ref()
        .map_or_else(|| sweep::summarize(state.router_state()), |rx| rx.borrow().clone());
    Json(summary)
}

async fn reset_model(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.router_state().reset_model(&id)?;
    tracing::info!(model = %id, "model state reset");
    Ok(StatusCode::NO_CONTENT)
}

async fn disable_model(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.router_state().set_disabled(&id, true)?;
    tracing::info!(model = %id, "model disabled");
    Ok(StatusCode::NO_CONTENT)
}

async fn enable_model(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.router_state().set_disabled(&id, false)?;
    tracing::info!(model = %id, "model enabled");
    Ok(StatusCode::NO_CONTENT)
}
