use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Configuration for a single upstream AI provider
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Provider wire protocol
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
}

/// Supported provider wire protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// OpenAI-compatible chat completions API
    Openai,
    /// Anthropic Messages API
    Anthropic,
}

/// A model registered for routing
///
/// The table key in `[models]` is the model identifier used throughout
/// routing, health and circuit reporting.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Name of the provider (key in `[providers]`) serving this model
    pub provider: String,
    /// Model name sent to the provider, defaults to the model identifier
    #[serde(default)]
    pub upstream_model: Option<String>,
    /// Use cases this model is suited for (e.g. `content_generation`)
    #[serde(default)]
    pub use_cases: Vec<String>,
    /// Cost of a single request in USD
    #[serde(default)]
    pub cost_per_request: f64,
    /// Hard timeout for a single call
    #[serde(default = "default_model_timeout", deserialize_with = "crate::duration::deserialize")]
    pub timeout: Duration,
}

const fn default_model_timeout() -> Duration {
    Duration::from_secs(30)
}
