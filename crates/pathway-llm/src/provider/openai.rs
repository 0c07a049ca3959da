//! OpenAI-compatible chat completions provider

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

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl TryFrom<ChatResponse> for ProviderResponse {
    type Error = ProviderError;

    fn try_from(response: ChatResponse) -> Result<Self, Self::Error> {
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("response has no message content".to_owned()))?;

        Ok(Self {
            content,
            usage: response.usage.map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }
}

/// OpenAI-compatible provider
pub struct OpenAiProvider {
    name: String,
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl OpenAiProvider {
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
impl Provider for OpenAiProvider {
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
        let body = ChatRequest {
            model: &model.upstream_model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: request.temperature(),
            max_tokens: request.max_tokens(),
            response_format: request.expects_json().then_some(ResponseFormat { kind: "json_object" }),
        };

        let mut builder = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .header("x-request-id", &context.request_id)
            .json(&body);

        if let Some(key) = resolve_api_key(self.api_key.as_ref(), context) {
            builder = builder.bearer_auth(key);
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

        let wire: ChatResponse = response
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
    fn extracts_first_choice_and_usage() {
        let wire: ChatResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"answer\": 4}"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
        }))
        .unwrap();

        let response = ProviderResponse::try_from(wire).unwrap();
        assert_eq!(response.content, "{\"answer\": 4}");
        assert_eq!(
            response.usage,
            Some(Usage {
                input_tokens: 12,
                output_tokens: 5
            })
        );
    }

    #[test]
    fn empty_choices_are_invalid() {
        let wire: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            ProviderResponse::try_from(wire),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn request_body_shape() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "sys",
                },
                ChatMessage {
                    role: "user",
                    content: "hi",
                },
            ],
            temperature: 0.0,
            max_tokens: 1024,
            response_format: Some(ResponseFormat { kind: "json_object" }),
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["response_format"]["type"], "json_object");
    }
}
