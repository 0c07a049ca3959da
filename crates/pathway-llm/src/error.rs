use std::time::Duration;

use http::StatusCode;
use pathway_core::HttpError;
use pathway_routing::{ErrorType, RoutingError};
use thiserror::Error;

use crate::types::ValidationError;

/// Failure of a single provider call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Provider answered with a non-success status
    #[error("provider returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Provider throttled the request
    #[error("provider rate limited the request")]
    RateLimited {
        /// Seconds until the limit resets, when the provider said
        retry_after: Option<u64>,
    },

    /// Connection-level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider answered but the body was unusable
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Call exceeded its hard timeout and was abandoned
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// No provider is configured under the model's provider name
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Classification recorded in the model's outcome
    pub const fn error_type(&self) -> ErrorType {
        match self {
            Self::Upstream { .. } => ErrorType::Upstream,
            Self::RateLimited { .. } => ErrorType::RateLimited,
            Self::Transport(_) => ErrorType::Transport,
            Self::InvalidResponse(_) => ErrorType::InvalidResponse,
            Self::Timeout(_) => ErrorType::Timeout,
            Self::NotConfigured(_) => ErrorType::Other,
        }
    }
}

/// Errors returned by [`Orchestrator::execute`](crate::Orchestrator::execute)
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Payload failed validation; nothing was routed
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    /// Routing failed before any attempt
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// Every model in the chain refused admission
    #[error("no model available for use case {use_case}")]
    NoAvailableModel { use_case: String },

    /// Every attempted model failed
    #[error("all {attempts} attempts failed, last error: {last_error}")]
    Exhausted { attempts: usize, last_error: ProviderError },
}

impl ExecutionError {
    /// Number of model calls made before failing
    pub const fn attempts(&self) -> usize {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::InvalidRequest(_) | Self::Routing(_) | Self::NoAvailableModel { .. } => 0,
        }
    }
}

impl HttpError for ExecutionError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Routing(e) => e.status_code(),
            Self::NoAvailableModel { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Exhausted { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::Routing(e) => e.error_type(),
            Self::NoAvailableModel { .. } => "no_available_model_error",
            Self::Exhausted { .. } => "upstream_error",
        }
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}
