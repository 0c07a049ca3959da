//! Mock model backend for integration tests
//!
//! Serves a minimal OpenAI chat completions endpoint and an Anthropic
//! messages endpoint, both answering with the same canned content.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Default answer, valid for every structured use case
pub const DEFAULT_CONTENT: &str = r#"{"answer": "4", "steps": ["2 + 2 = 4"]}"#;

/// Mock backend with scripted failures and latency
pub struct MockLlm {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockLlmState>,
}

struct MockLlmState {
    request_count: AtomicU32,
    /// Requests still to fail before succeeding
    fail_remaining: AtomicU32,
    failure_status: StatusCode,
    delay: Option<Duration>,
    content: String,
    last_model: Mutex<Option<String>>,
    last_credential: Mutex<Option<String>>,
}

/// Builder for a mock backend
pub struct MockLlmBuilder {
    fail_count: u32,
    failure_status: StatusCode,
    delay: Option<Duration>,
    content: String,
}

impl MockLlmBuilder {
    /// Fail the first `n` requests
    pub fn failing(mut self, n: u32) -> Self {
        self.fail_count = n;
        self
    }

    /// Fail every request
    pub fn always_failing(self) -> Self {
        self.failing(u32::MAX)
    }

    pub fn failure_status(mut self, status: StatusCode) -> Self {
        self.failure_status = status;
        self
    }

    /// Sleep before answering
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn content(mut self, content: &str) -> Self {
        content.clone_into(&mut self.content);
        self
    }

    pub async fn start(self) -> anyhow::Result<MockLlm> {
        let state = Arc::new(MockLlmState {
            request_count: AtomicU32::new(0),
            fail_remaining: AtomicU32::new(self.fail_count),
            failure_status: self.failure_status,
            delay: self.delay,
            content: self.content,
            last_model: Mutex::new(None),
            last_credential: Mutex::new(None),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .route("/v1/messages", routing::post(handle_messages))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(MockLlm { addr, shutdown, state })
    }
}

impl MockLlm {
    pub fn builder() -> MockLlmBuilder {
        MockLlmBuilder {
            fail_count: 0,
            failure_status: StatusCode::INTERNAL_SERVER_ERROR,
            delay: None,
            content: DEFAULT_CONTENT.to_owned(),
        }
    }

    /// Start a mock that always succeeds with the default content
    pub async fn start() -> anyhow::Result<Self> {
        Self::builder().start().await
    }

    /// Start a mock that fails every request with 500
    pub async fn start_failing() -> anyhow::Result<Self> {
        Self::builder().always_failing().start().await
    }

    /// Base URL for configuring the mock as a provider
    ///
    /// Includes `/v1` since providers append `/chat/completions` or `/messages`
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Number of model requests received
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::Relaxed)
    }

    /// Upstream model name of the last request
    pub fn last_model(&self) -> Option<String> {
        self.state.last_model.lock().unwrap().clone()
    }

    /// Bearer token or `x-api-key` of the last request
    pub fn last_credential(&self) -> Option<String> {
        self.state.last_credential.lock().unwrap().clone()
    }
}

impl Drop for MockLlm {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[derive(Debug, Deserialize)]
struct ModelRequest {
    model: String,
}

impl MockLlmState {
    /// Shared bookkeeping; returns a failure response when one is due
    async fn admit(&self, headers: &HeaderMap, model: String) -> Option<Response> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        *self.last_model.lock().unwrap() = Some(model);

        let credential = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .or_else(|| headers.get("x-api-key").and_then(|v| v.to_str().ok()))
            .map(str::to_owned);
        *self.last_credential.lock().unwrap() = credential;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .fail_remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        failing.then(|| {
            let body = serde_json::json!({"error": {"message": "mock failure", "type": "server_error"}});
            (self.failure_status, Json(body)).into_response()
        })
    }
}

async fn handle_chat_completions(
    State(state): State<Arc<MockLlmState>>,
    headers: HeaderMap,
    Json(request): Json<ModelRequest>,
) -> Response {
    if let Some(failure) = state.admit(&headers, request.model.clone()).await {
        return failure;
    }

    Json(serde_json::json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "created": 0,
        "model": request.model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": state.content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    }))
    .into_response()
}

async fn handle_messages(
    State(state): State<Arc<MockLlmState>>,
    headers: HeaderMap,
    Json(request): Json<ModelRequest>,
) -> Response {
    if let Some(failure) = state.admit(&headers, request.model.clone()).await {
        return failure;
    }

    Json(serde_json::json!({
        "id": "msg_mock",
        "type": "message",
        "role": "assistant",
        "model": request.model,
        "content": [{"type": "text", "text": state.content}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 10, "output_tokens": 5}
    }))
    .into_response()
}
