//! Routing-specific error types

use http::StatusCode;
use pathway_core::HttpError;
use thiserror::Error;

/// Errors that can occur while choosing a model
///
/// Every variant is terminal: the caller must not retry the same request
/// against the router.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// No registered model lists the use case among its capabilities
    #[error("no model supports use case: {use_case}")]
    NoRoute { use_case: String },

    /// Capable models exist but every one is circuit-open or disabled
    #[error("no eligible model for use case: {use_case}")]
    NoEligibleModel { use_case: String },

    /// Model identifier is not registered
    #[error("unknown model: {model_id}")]
    UnknownModel { model_id: String },

    /// Strategy has no registered implementation
    #[error("routing strategy not registered: {strategy}")]
    UnknownStrategy { strategy: String },
}

impl HttpError for RoutingError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NoRoute { .. } | Self::UnknownModel { .. } => StatusCode::NOT_FOUND,
            Self::NoEligibleModel { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::UnknownStrategy { .. } => StatusCode::BAD_REQUEST,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::NoRoute { .. } => "no_route_error",
            Self::NoEligibleModel { .. } => "no_eligible_model_error",
            Self::UnknownModel { .. } => "not_found_error",
            Self::UnknownStrategy { .. } => "invalid_request_error",
        }
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}
