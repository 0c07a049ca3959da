//! Registry of routable models
//!
//! Built once from the `[models]` table and read-only afterwards.

use std::collections::BTreeSet;
use std::time::Duration;

use indexmap::IndexMap;
use pathway_config::ModelConfig;

/// A registered model and its static routing attributes
#[derive(Debug, Clone)]
pub struct ModelProfile {
    /// Model identifier used throughout routing
    pub id: String,
    /// Provider name serving the model
    pub provider: String,
    /// Model name sent to the provider
    pub upstream_model: String,
    /// Use cases the model is suited for
    pub use_cases: BTreeSet<String>,
    /// Cost of a single request in USD
    pub cost_per_request: f64,
    /// Hard timeout for a single call
    pub timeout: Duration,
}

impl ModelProfile {
    /// Whether the model lists `use_case` among its capabilities
    pub fn supports(&self, use_case: &str) -> bool {
        self.use_cases.contains(use_case)
    }

    /// Declared timeout in milliseconds
    pub fn timeout_ms(&self) -> f64 {
        self.timeout.as_secs_f64() * 1000.0
    }
}

/// Registry of all routable models
#[derive(Debug, Default)]
pub struct ModelRegistry {
    profiles: Vec<ModelProfile>,
}

impl ModelRegistry {
    /// Build a registry from the `[models]` configuration table
    pub fn from_config(models: &IndexMap<String, ModelConfig>) -> Self {
        let profiles = models
            .iter()
            .map(|(id, c)| ModelProfile {
                id: id.clone(),
                provider: c.provider.clone(),
                upstream_model: c.upstream_model.clone().unwrap_or_else(|| id.clone()),
                use_cases: c.use_cases.iter().cloned().collect(),
                cost_per_request: c.cost_per_request,
                timeout: c.timeout,
            })
            .collect();

        Self { profiles }
    }

    /// All registered profiles in configuration order
    pub fn profiles(&self) -> &[ModelProfile] {
        &self.profiles
    }

    /// Find a profile by model identifier
    pub fn find(&self, id: &str) -> Option<&ModelProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// Profiles capable of serving `use_case`, in configuration order
    pub fn supporting(&self, use_case: &str) -> Vec<&ModelProfile> {
        self.profiles.iter().filter(|p| p.supports(use_case)).collect()
    }

    /// Every use case served by at least one model
    pub fn use_cases(&self) -> BTreeSet<&str> {
        self.profiles
            .iter()
            .flat_map(|p| p.use_cases.iter().map(String::as_str))
            .collect()
    }
}
