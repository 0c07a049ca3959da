//! Fallback execution over a routing decision
//!
//! The orchestrator routes a request, then walks the selected model and its
//! fallbacks until one answers. Each call is admitted by the model's circuit,
//! bounded by a hard timeout, and fed back into router state whatever its
//! result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pathway_config::{ExecutionConfig, StrategyKind};
use pathway_core::RequestContext;
use pathway_routing::events::RoutingEvent;
use pathway_routing::{ModelProfile, RequestOutcome, RouterState, RoutingContext, RoutingDecision};
use pathway_telemetry::metrics;
use pathway_telemetry::{Counter, Histogram, KeyValue};
use serde::Serialize;

use crate::cache::ResponseCache;
use crate::error::{ExecutionError, ProviderError};
use crate::parse::extract_json;
use crate::provider::ProviderSet;
use crate::types::{AiRequest, AiResponse};

/// Per-call execution overrides
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Upper bound for each attempt, further capped by the model timeout
    pub timeout: Option<Duration>,
    /// Attempt budget, capped by the configured maximum
    pub max_attempts: Option<usize>,
    /// Routing strategy override
    pub strategy: Option<StrategyKind>,
}

/// Successful execution
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutput {
    pub response: AiResponse,
    /// Model that produced the answer
    pub model_id: String,
    /// Model calls made, zero for a cache hit
    pub attempts: usize,
    /// Routing decision walked, absent for a cache hit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<RoutingDecision>,
    pub cached: bool,
}

struct Instruments {
    attempts: Counter<u64>,
    attempt_duration: Histogram<f64>,
    executions: Counter<u64>,
    execution_duration: Histogram<f64>,
    cache_hits: Counter<u64>,
}

impl Instruments {
    fn new() -> Self {
        let meter = metrics::meter();
        Self {
            attempts: meter
                .u64_counter(metrics::ATTEMPT_COUNT)
                .with_description("Model calls made while executing requests")
                .build(),
            attempt_duration: meter
                .f64_histogram(metrics::ATTEMPT_DURATION)
                .with_unit("s")
                .with_description("Duration of a single model call")
                .build(),
            executions: meter
                .u64_counter(metrics::EXECUTION_COUNT)
                .with_description("Executed requests by result")
                .build(),
            execution_duration: meter
                .f64_histogram(metrics::EXECUTION_DURATION)
                .with_unit("s")
                .with_description("End-to-end execution time including fallbacks")
                .build(),
            cache_hits: meter
                .u64_counter(metrics::CACHE_HIT_COUNT)
                .with_description("Requests answered from the response cache")
                .build(),
        }
    }
}

/// Releases a claimed half-open trial unless an outcome was recorded
struct TrialGuard<'a> {
    state: &'a RouterState,
    model_id: &'a str,
    armed: bool,
}

impl<'a> TrialGuard<'a> {
    const fn new(state: &'a RouterState, model_id: &'a str, trial: bool) -> Self {
        Self {
            state,
            model_id,
            armed: trial,
        }
    }

    const fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.release_trial(self.model_id);
        }
    }
}

/// Executes typed AI requests with health-aware fallback
pub struct Orchestrator {
    state: Arc<RouterState>,
    providers: ProviderSet,
    cache: Option<ResponseCache>,
    config: ExecutionConfig,
    instruments: Instruments,
}

impl Orchestrator {
    pub fn new(
        state: Arc<RouterState>,
        providers: ProviderSet,
        cache: Option<ResponseCache>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            state,
            providers,
            cache,
            config,
            instruments: Instruments::new(),
        }
    }

    pub const fn state(&self) -> &Arc<RouterState> {
        &self.state
    }

    pub const fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    /// Route and run `request`, falling back along the decision chain
    pub async fn execute(
        &self,
        request: &AiRequest,
        context: &RequestContext,
        options: ExecuteOptions,
    ) -> Result<ExecutionOutput, ExecutionError> {
        let use_case = request.use_case();
        let request_id = context.request_id.as_str();

        request.validate()?;

        if let Some(output) = self.cached(request, context) {
            return Ok(output);
        }

        let started = Instant::now();
        let routing = RoutingContext {
            strategy: options.strategy,
            request_id: Some(request_id.to_owned()),
        };
        let decision = self.state.route(use_case, &routing)?;

        let budget = options
            .max_attempts
            .map_or(self.config.max_attempts, |n| n.min(self.config.max_attempts))
            .max(1);

        let chain: Vec<String> = decision.chain().map(str::to_owned).collect();
        let mut attempts = 0;
        let mut last_error = None;

        for model_id in &chain {
            if attempts == budget {
                break;
            }

            let Some(profile) = self.state.registry().find(model_id) else {
                continue;
            };

            let admission = self.state.acquire(model_id);
            if !admission.allowed {
                tracing::debug!(model = %model_id, use_case, request_id, "circuit refused admission, skipping");
                continue;
            }
            let mut trial = TrialGuard::new(&self.state, model_id, admission.trial);

            attempts += 1;
            self.state
                .publish(RoutingEvent::attempt_started(model_id, use_case, attempts, Some(request_id)));

            let attempt_started = Instant::now();
            let result = self.attempt(profile, request, context, options.timeout).await;
            self.record_attempt(model_id, use_case, request_id, attempt_started, admission.trial, &result);
            trial.disarm();

            match result {
                Ok(response) => {
                    tracing::info!(model = %model_id, use_case, request_id, attempts, "request executed");

                    if request.is_cacheable()
                        && let Some(cache) = &self.cache
                    {
                        cache.insert(request, response.clone());
                    }

                    self.finish(use_case, started, "success");
                    self.state.publish(RoutingEvent::execution_succeeded(
                        use_case,
                        model_id,
                        attempts,
                        false,
                        Some(request_id),
                    ));

                    return Ok(ExecutionOutput {
                        response,
                        model_id: model_id.clone(),
                        attempts,
                        decision: Some(decision),
                        cached: false,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        model = %model_id,
                        use_case,
                        request_id,
                        attempt = attempts,
                        error = %e,
                        "model attempt failed, falling back"
                    );
                    last_error = Some(e);
                }
            }
        }

        self.finish(use_case, started, "failure");

        let error = match last_error {
            Some(last_error) => ExecutionError::Exhausted { attempts, last_error },
            None => ExecutionError::NoAvailableModel {
                use_case: use_case.to_owned(),
            },
        };

        tracing::error!(use_case, request_id, attempts, error = %error, "request execution failed");
        self.state.publish(RoutingEvent::execution_failed(
            use_case,
            attempts,
            error.to_string(),
            Some(request_id),
        ));

        Err(error)
    }

    fn cached(&self, request: &AiRequest, context: &RequestContext) -> Option<ExecutionOutput> {
        if !request.is_cacheable() {
            return None;
        }
        let response = self.cache.as_ref()?.get(request)?;
        let use_case = request.use_case();

        tracing::debug!(use_case, model = %response.model_id, "response cache hit");
        self.instruments.cache_hits.add(1, &[KeyValue::new("use_case", use_case)]);
        self.state.publish(RoutingEvent::execution_succeeded(
            use_case,
            &response.model_id,
            0,
            true,
            Some(&context.request_id),
        ));

        Some(ExecutionOutput {
            model_id: response.model_id.clone(),
            response,
            attempts: 0,
            decision: None,
            cached: true,
        })
    }

    /// One bounded call to a single model
    async fn attempt(
        &self,
        profile: &ModelProfile,
        request: &AiRequest,
        context: &RequestContext,
        timeout: Option<Duration>,
    ) -> Result<AiResponse, ProviderError> {
        let provider = self
            .providers
            .get(&profile.provider)
            .ok_or_else(|| ProviderError::NotConfigured(profile.provider.clone()))?;

        let limit = timeout
            .or(self.config.default_timeout)
            .map_or(profile.timeout, |t| t.min(profile.timeout));

        let raw = tokio::time::timeout(limit, provider.invoke(profile, request, context))
            .await
            .map_err(|_| ProviderError::Timeout(limit))??;

        let data = if request.expects_json() {
            let value = extract_json(&raw.content)
                .ok_or_else(|| ProviderError::InvalidResponse("model did not return a JSON object".to_owned()))?;
            Some(value)
        } else {
            None
        };

        Ok(AiResponse {
            model_id: profile.id.clone(),
            use_case: request.use_case().to_owned(),
            content: raw.content,
            data,
            usage: raw.usage,
        })
    }

    /// Feed an attempt result back into router state and metrics
    fn record_attempt(
        &self,
        model_id: &str,
        use_case: &'static str,
        request_id: &str,
        started: Instant,
        trial: bool,
        result: &Result<AiResponse, ProviderError>,
    ) {
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let error_type = result.as_ref().err().map(ProviderError::error_type);

        let recorded = match error_type {
            None => RequestOutcome::success(model_id, use_case, elapsed_ms),
            Some(error_type) => RequestOutcome::failure(model_id, use_case, elapsed_ms, error_type),
        };
        if let Err(e) = self
            .state
            .record_attempt(recorded.with_request_id(Some(request_id.to_owned())), trial)
        {
            tracing::warn!(model = %model_id, error = %e, "failed to record attempt outcome");
        }

        let outcome = error_type.map_or_else(|| "success".to_owned(), |t| t.to_string());
        let attributes = [
            KeyValue::new("model", model_id.to_owned()),
            KeyValue::new("use_case", use_case),
            KeyValue::new("outcome", outcome),
        ];
        self.instruments.attempts.add(1, &attributes);
        metrics::record_duration(&self.instruments.attempt_duration, started, &attributes);
    }

    fn finish(&self, use_case: &'static str, started: Instant, result: &'static str) {
        let attributes = [KeyValue::new("use_case", use_case), KeyValue::new("result", result)];
        self.instruments.executions.add(1, &attributes);
        metrics::record_duration(&self.instruments.execution_duration, started, &attributes);
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.providers)
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
