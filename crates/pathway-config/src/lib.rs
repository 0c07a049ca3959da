#![allow(clippy::must_use_candidate)]

pub mod circuit;
mod duration;
mod env;
pub mod execution;
pub mod health;
mod loader;
pub mod models;
pub mod routing;
pub mod server;
pub mod telemetry;

use indexmap::IndexMap;
use serde::Deserialize;

pub use circuit::*;
pub use execution::*;
pub use health::*;
pub use models::*;
pub use routing::*;
pub use server::*;
pub use telemetry::*;

/// Top-level Pathway configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream AI providers keyed by name
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
    /// Registered models keyed by model identifier
    #[serde(default)]
    pub models: IndexMap<String, ModelConfig>,
    /// Rolling health window and status thresholds
    #[serde(default)]
    pub health: HealthConfig,
    /// Per-model circuit breaker parameters
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    /// Routing strategy selection
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Fallback execution limits
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Outcome history retention
    #[serde(default)]
    pub history: HistoryConfig,
    /// Periodic health summary sweep
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Response cache
    #[serde(default)]
    pub cache: Option<CacheConfig>,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
