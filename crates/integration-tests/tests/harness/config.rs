//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;
use std::time::Duration;

use pathway_config::{
    CacheConfig, Config, ModelConfig, ProviderConfig, ProviderType, StrategyKind,
};
use secrecy::SecretString;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Minimal config listening on an ephemeral port with the sweep off
    pub fn new() -> Self {
        let mut config = Config::default();
        config.server.listen_address = Some(SocketAddr::from(([127, 0, 0, 1], 0)));
        config.sweep.enabled = false;
        Self { config }
    }

    /// Add an OpenAI-compatible provider pointed at a mock backend
    pub fn with_openai_provider(self, name: &str, base_url: &str) -> Self {
        self.with_provider(name, ProviderType::Openai, base_url)
    }

    /// Add an Anthropic provider pointed at a mock backend
    pub fn with_anthropic_provider(self, name: &str, base_url: &str) -> Self {
        self.with_provider(name, ProviderType::Anthropic, base_url)
    }

    fn with_provider(mut self, name: &str, provider_type: ProviderType, base_url: &str) -> Self {
        self.config.providers.insert(
            name.to_owned(),
            ProviderConfig {
                provider_type,
                api_key: Some(SecretString::from("test-key")),
                base_url: Some(base_url.parse().expect("valid URL")),
            },
        );
        self
    }

    /// Register a model served by `provider` for the given use cases
    pub fn with_model(mut self, id: &str, provider: &str, use_cases: &[&str]) -> Self {
        self.config.models.insert(
            id.to_owned(),
            ModelConfig {
                provider: provider.to_owned(),
                upstream_model: Some(format!("{id}-upstream")),
                use_cases: use_cases.iter().map(|&u| u.to_owned()).collect(),
                cost_per_request: 0.01,
                timeout: Duration::from_secs(5),
            },
        );
        self
    }

    /// Override a registered model's timeout
    pub fn with_model_timeout(mut self, id: &str, timeout: Duration) -> Self {
        if let Some(model) = self.config.models.get_mut(id) {
            model.timeout = timeout;
        }
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.config.circuit_breaker.failure_threshold = threshold;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.config.routing.strategy = strategy;
        self
    }

    pub fn with_cache(mut self) -> Self {
        self.config.cache = Some(CacheConfig {
            enabled: true,
            ttl: Duration::from_secs(60),
            max_capacity: 100,
        });
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Build the final config, checked like a loaded file
    pub fn build(self) -> Config {
        self.config.validate().expect("valid test config");
        self.config
    }
}
