//! Per-attempt outcome records fed back into health and circuit state

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Failure classification kept for observability
///
/// Every variant counts as a failure for health and circuit purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorType {
    /// Call exceeded its hard timeout and was abandoned
    Timeout,
    /// Provider answered with a non-success status
    Upstream,
    /// Provider rejected the call for rate limiting
    RateLimited,
    /// Provider answered but the body could not be used
    InvalidResponse,
    /// Connection-level failure before any response
    Transport,
    /// Anything else
    Other,
}

/// Result of a single model attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    /// Model that handled the attempt
    pub model_id: String,
    /// Use case the attempt served
    pub use_case: String,
    /// Wall-clock time of the attempt in milliseconds
    pub response_time_ms: u64,
    /// Whether the attempt succeeded
    pub success: bool,
    /// Failure classification, absent on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    /// When the outcome was recorded (unix milliseconds)
    pub recorded_at_ms: u64,
    /// Request the attempt belonged to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl RequestOutcome {
    /// Successful attempt recorded now
    pub fn success(model_id: impl Into<String>, use_case: impl Into<String>, response_time_ms: u64) -> Self {
        Self {
            model_id: model_id.into(),
            use_case: use_case.into(),
            response_time_ms,
            success: true,
            error_type: None,
            recorded_at_ms: now_millis(),
            request_id: None,
        }
    }

    /// Failed attempt recorded now
    pub fn failure(
        model_id: impl Into<String>,
        use_case: impl Into<String>,
        response_time_ms: u64,
        error_type: ErrorType,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            use_case: use_case.into(),
            response_time_ms,
            success: false,
            error_type: Some(error_type),
            recorded_at_ms: now_millis(),
            request_id: None,
        }
    }

    /// Tag the outcome with the request it belonged to
    #[must_use]
    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }
}

/// Current unix time in milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
