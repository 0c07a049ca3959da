use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use pathway_core::HttpError;
use pathway_llm::ExecutionError;
use pathway_routing::RoutingError;
use thiserror::Error;

/// Error returned by every JSON handler
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Well-formed body with values the handler rejects
    #[error("{0}")]
    BadRequest(String),
}

impl HttpError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Routing(e) => e.status_code(),
            Self::Execution(e) => e.status_code(),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Routing(e) => e.error_type(),
            Self::Execution(e) => e.error_type(),
            Self::BadRequest(_) => "invalid_request_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Routing(e) => e.client_message(),
            Self::Execution(e) => e.client_message(),
            Self::BadRequest(message) => message.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(status = %status, error = %self, "request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "request rejected");
        }

        let body = serde_json::json!({
            "error": {
                "message": self.client_message(),
                "type": self.error_type(),
            }
        });

        (status, Json(body)).into_response()
    }
}
