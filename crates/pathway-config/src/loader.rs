use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no model is registered, a model references an
    /// unknown provider, or a threshold is out of range
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_models()?;
        self.validate_health()?;
        self.validate_circuit_breaker()?;
        self.validate_routing()?;
        self.validate_limits()?;
        Ok(())
    }

    fn validate_models(&self) -> anyhow::Result<()> {
        if self.models.is_empty() {
            anyhow::bail!("at least one model must be registered under [models]");
        }

        for (id, model) in &self.models {
            if !self.providers.contains_key(&model.provider) {
                anyhow::bail!("model '{id}' references unknown provider '{}'", model.provider);
            }

            if model.use_cases.is_empty() {
                anyhow::bail!("model '{id}' must declare at least one use case");
            }

            if !model.cost_per_request.is_finite() || model.cost_per_request < 0.0 {
                anyhow::bail!("model '{id}' has an invalid cost_per_request");
            }

            if model.timeout.is_zero() {
                anyhow::bail!("model '{id}' timeout must be greater than 0");
            }
        }

        Ok(())
    }

    fn validate_health(&self) -> anyhow::Result<()> {
        let health = &self.health;

        if health.window_size == 0 {
            anyhow::bail!("health.window_size must be greater than 0");
        }

        if !is_ratio(health.healthy_success_rate) || !is_ratio(health.degraded_success_rate) {
            anyhow::bail!("health success rates must be between 0.0 and 1.0");
        }

        if health.degraded_success_rate > health.healthy_success_rate {
            anyhow::bail!("health.degraded_success_rate must not exceed health.healthy_success_rate");
        }

        Ok(())
    }

    fn validate_circuit_breaker(&self) -> anyhow::Result<()> {
        let breaker = &self.circuit_breaker;

        if breaker.failure_threshold == 0 {
            anyhow::bail!("circuit_breaker.failure_threshold must be at least 1");
        }

        if breaker.base_backoff > breaker.max_backoff {
            anyhow::bail!("circuit_breaker.base_backoff must not exceed circuit_breaker.max_backoff");
        }

        Ok(())
    }

    fn validate_routing(&self) -> anyhow::Result<()> {
        if !is_ratio(self.routing.success_rate_floor) {
            anyhow::bail!("routing.success_rate_floor must be between 0.0 and 1.0");
        }

        for use_case in self.routing.use_cases.keys() {
            let served = self
                .models
                .values()
                .any(|model| model.use_cases.iter().any(|u| u == use_case));

            if !served {
                tracing::warn!(use_case, "routing override configured for a use case no model serves");
            }
        }

        Ok(())
    }

    fn validate_limits(&self) -> anyhow::Result<()> {
        if self.execution.max_attempts == 0 {
            anyhow::bail!("execution.max_attempts must be at least 1");
        }

        if self.history.max_entries == 0 {
            anyhow::bail!("history.max_entries must be at least 1");
        }

        if self.sweep.enabled && self.sweep.interval.is_zero() {
            anyhow::bail!("sweep.interval must be greater than 0");
        }

        Ok(())
    }
}

fn is_ratio(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}
