//! Anthropic Messages API provider

use async_trait::async_trait;
use pathway_config::ProviderConfig;
use pathway_core::RequestContext;
use pathway_routing::ModelProfile;
use reqwest::Client;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::{Provider, endpoint, resolve_api_key, status_error, transport_error};
use crate::error::ProviderError;
use crate::types::{AiRequest, ProviderResponse, Usage};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl TryFrom<MessagesResponse> for ProviderResponse {
    type Error = ProviderError;

    fn try_from(response: MessagesResponse) -> Result<Self, Self::Error> {
        let content: String = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();

        if content.trim().is_empty() {
            return Err(ProviderError::InvalidResponse("response has no text content".to_owned()));
        }

        Ok(Self {
            content,
            usage: response.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
        })
    }
}

/// Anthropic provider
pub struct AnthropicProvider {
    name: String,
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl AnthropicProvider {
    pub fn new(name: String, config: &ProviderConfig, client: Client) -> Self {
        let base_url = config
            .base_url
            .as_ref()
            .map_or_else(|| DEFAULT_BASE_URL.to_owned(), ToString::to_string);

        Self {
            name,
            client,
            base_url,
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        model: &ModelProfile,
        request: &AiRequest,
        context: &RequestContext,
    ) -> Result<ProviderResponse, ProviderError> {
        let prompt = request.prompt();
        let body = MessagesRequest {
            model: &model.upstream_model,
            max_tokens: request.max_tokens(),
            system: &prompt.system,
            messages: [Message {
                role: "user",
                content: &prompt.user,
            }],
            temperature: request.temperature(),
        };

        let mut builder = self
            .client
            .post(endpoint(&self.base_url, "messages"))
            .header("anthropic-version", API_VERSION)
            .header("x-request-id", &context.request_id)
            .json(&body);

        if let Some(key) = resolve_api_key(self.api_key.as_ref(), context) {
            builder = builder.header("x-api-key", key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(&self.name, &e))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %self.name, model = %model.id, status = %status, "upstream returned error");
            return Err(status_error(status, &headers, &body));
        }

        let wire: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse response: {e}")))?;

        wire.try_into()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn joins_text_blocks_and_skips_others() {
        let wire: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "type": "message",
            "content": [
                {"type": "text", "text": "{\"safe\": "},
                {"type": "tool_use", "id": "t1", "name": "x", "input": {}},
                {"type": "text", "text": "true}"}
            ],
            "usage": {"input_tokens": 30, "output_tokens": 4}
        }))
        .unwrap();

        let response = ProviderResponse::try_from(wire).unwrap();
        assert_eq!(response.content, "{\"safe\": true}");
        assert_eq!(response.usage.map(|u| u.input_tokens), Some(30));
    }

    #[test]
    fn blank_content_is_invalid() {
        let wire: MessagesResponse = serde_json::from_value(json!({"content": [{"type": "text", "text": "  "}]})).unwrap();
        assert!(matches!(
            ProviderResponse::try_from(wire),
            Err(ProviderError::InvalidResponse(_))
        ));
    }
}
