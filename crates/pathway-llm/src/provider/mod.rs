//! Provider trait and implementations for AI backends

pub mod anthropic;
pub mod openai;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use pathway_config::{ProviderConfig, ProviderType};
use pathway_core::RequestContext;
use pathway_routing::ModelProfile;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};

use crate::error::ProviderError;
use crate::types::{AiRequest, ProviderResponse};

/// Longest upstream error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Trait implemented by each provider backend
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name from configuration
    fn name(&self) -> &str;

    /// Send one request to `model` and return its raw answer
    async fn invoke(
        &self,
        model: &ModelProfile,
        request: &AiRequest,
        context: &RequestContext,
    ) -> Result<ProviderResponse, ProviderError>;
}

/// Configured providers keyed by name
#[derive(Clone, Default)]
pub struct ProviderSet {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderSet {
    /// Build every configured provider
    pub fn from_config(configs: &IndexMap<String, ProviderConfig>) -> Self {
        let client = reqwest::Client::new();
        let mut set = Self::default();

        for (name, config) in configs {
            let provider: Arc<dyn Provider> = match config.provider_type {
                ProviderType::Openai => Arc::new(openai::OpenAiProvider::new(name.clone(), config, client.clone())),
                ProviderType::Anthropic => {
                    Arc::new(anthropic::AnthropicProvider::new(name.clone(), config, client.clone()))
                }
            };
            tracing::debug!(provider = %name, kind = ?config.provider_type, "provider configured");
            set.insert(provider);
        }

        set
    }

    /// Add or replace a provider under its own name
    pub fn insert(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name().to_owned(), provider);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.get(name)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Caller-supplied key wins over the configured one
fn resolve_api_key(configured: Option<&SecretString>, context: &RequestContext) -> Option<String> {
    context
        .api_key
        .as_ref()
        .or(configured)
        .map(|key| key.expose_secret().to_owned())
}

/// Endpoint URL under a provider base URL
fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

/// Classify a non-success upstream response
fn status_error(status: reqwest::StatusCode, headers: &HeaderMap, body: &str) -> ProviderError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        return ProviderError::RateLimited { retry_after };
    }

    let message: String = body.chars().take(MAX_ERROR_BODY).collect();
    ProviderError::Upstream {
        status: status.as_u16(),
        message,
    }
}

fn transport_error(provider: &str, error: &reqwest::Error) -> ProviderError {
    tracing::error!(provider, error = %error, "upstream request failed");
    ProviderError::Transport(error.to_string())
}
