//! Typed AI requests executed through health-aware fallback
//!
//! Requests are validated, routed by `pathway-routing`, and sent to
//! OpenAI-compatible or Anthropic providers. Every attempt is written back
//! into router state so later routing reflects it.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod cache;
pub mod error;
pub mod orchestrator;
pub mod parse;
pub mod provider;
pub mod types;

pub use cache::ResponseCache;
pub use error::{ExecutionError, ProviderError};
pub use orchestrator::{ExecuteOptions, ExecutionOutput, Orchestrator};
pub use provider::{Provider, ProviderSet};
pub use types::{AiRequest, AiResponse, ValidationError};
