//! OpenRouter chat-completions client.
//!
//! Thin async HTTP adapter over the OpenRouter API. The control plane only
//! depends on the [`ModelEndpoint`](crate::profiles::ModelEndpoint) contract;
//! this client is the concrete transport behind it.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::profiles::bench::{EndpointOutput, ModelEndpoint};
use crate::router::TaskType;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// A message in a conversation with a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A chat-completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ChatRequest {
    /// Creates a deterministic (temperature 0) request.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.0,
            max_tokens: None,
            response_format: None,
            metadata: None,
        }
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Caps the generated tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Requests a structured response format.
    pub fn with_response_format(mut self, response_format: serde_json::Value) -> Self {
        self.response_format = Some(response_format);
        self
    }
}

/// Token usage reported by the API.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CompletionUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// A completed chat exchange.
#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub model: String,
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
    pub usage: CompletionUsage,
}

/// Wire shapes. Providers disagree on usage field names, hence the aliases.
#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<WireContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Fragments(Vec<WireFragment>),
}

#[derive(Debug, Deserialize)]
struct WireFragment {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default, alias = "input_tokens")]
    prompt_tokens: u32,
    #[serde(default, alias = "output_tokens")]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// Client for the OpenRouter chat completions API.
pub struct OpenRouterClient {
    base_url: String,
    api_key: String,
    referer: Option<String>,
    title: Option<String>,
    http_client: Client,
}

impl OpenRouterClient {
    /// Creates a client with explicit configuration and a 120 second
    /// request timeout.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            referer: None,
            title: None,
            http_client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `OPENROUTER_API_KEY` (required)
    /// - `OPENROUTER_BASE_URL` (default `https://openrouter.ai/api/v1`)
    /// - `OPENROUTER_APP_URL` / `OPENROUTER_APP_NAME` (optional attribution)
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingApiKey` when no key is configured.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = env::var("OPENROUTER_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(LlmError::MissingApiKey)?;
        let base_url =
            env::var("OPENROUTER_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let mut client = Self::new(api_key, base_url);
        client.referer = env::var("OPENROUTER_APP_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());
        client.title = env::var("OPENROUTER_APP_NAME")
            .ok()
            .filter(|value| !value.trim().is_empty());
        Ok(client)
    }

    /// Sets the `HTTP-Referer` attribution header.
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Sets the `X-Title` attribution header.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Runs one chat completion.
    pub async fn chat_completion(&self, request: &ChatRequest) -> Result<CompletionResult, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut http_request = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request);
        if let Some(referer) = &self.referer {
            http_request = http_request.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.title {
            http_request = http_request.header("X-Title", title);
        }

        let response = http_request
            .send()
            .await
            .map_err(|err| LlmError::RequestFailed(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                code: status.as_u16(),
                message,
            });
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|err| LlmError::ParseError(err.to_string()))?;
        Self::into_result(wire, &request.model)
    }

    fn into_result(wire: WireResponse, requested_model: &str) -> Result<CompletionResult, LlmError> {
        let choice = wire.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;
        let message_payload = choice.message.unwrap_or(WireMessage {
            role: None,
            content: None,
        });

        let content = match message_payload.content {
            Some(WireContent::Text(text)) => text,
            Some(WireContent::Fragments(fragments)) => fragments
                .into_iter()
                .filter_map(|fragment| fragment.text)
                .collect::<Vec<_>>()
                .join("\n"),
            None => String::new(),
        };

        let usage_payload = wire.usage.unwrap_or_default();
        let mut usage = CompletionUsage {
            input_tokens: usage_payload.prompt_tokens,
            output_tokens: usage_payload.completion_tokens,
            total_tokens: usage_payload.total_tokens,
        };
        if usage.total_tokens == 0 {
            usage.total_tokens = usage.input_tokens + usage.output_tokens;
        }

        Ok(CompletionResult {
            model: wire.model.unwrap_or_else(|| requested_model.to_string()),
            message: ChatMessage {
                role: message_payload.role.unwrap_or_else(|| "assistant".to_string()),
                content,
            },
            finish_reason: choice.finish_reason,
            usage,
        })
    }
}

#[async_trait]
impl ModelEndpoint for OpenRouterClient {
    async fn invoke(
        &self,
        model_id: &str,
        task_type: TaskType,
        document: &str,
    ) -> Result<EndpointOutput, LlmError> {
        let request = ChatRequest::new(
            model_id,
            vec![
                ChatMessage::system(format!("You are performing a {task_type} task.")),
                ChatMessage::user(document),
            ],
        );
        let result = self.chat_completion(&request).await?;
        Ok(EndpointOutput {
            output_tokens: result.usage.output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> CompletionResult {
        let wire: WireResponse = serde_json::from_value(json).expect("wire parses");
        OpenRouterClient::into_result(wire, "fallback-model").expect("result builds")
    }

    #[test]
    fn test_parses_standard_response() {
        let result = parse(serde_json::json!({
            "model": "openai/gpt-4o-mini",
            "choices": [{
                "message": {"role": "assistant", "content": "{\"a\": 1}"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19}
        }));
        assert_eq!(result.model, "openai/gpt-4o-mini");
        assert_eq!(result.message.role, "assistant");
        assert_eq!(result.message.content, "{\"a\": 1}");
        assert_eq!(result.finish_reason.as_deref(), Some("stop"));
        assert_eq!(result.usage.total_tokens, 19);
    }

    #[test]
    fn test_usage_aliases_and_total_derivation() {
        let result = parse(serde_json::json!({
            "choices": [{"message": {"content": "ok"}}],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }));
        assert_eq!(result.usage.input_tokens, 10);
        assert_eq!(result.usage.output_tokens, 5);
        assert_eq!(result.usage.total_tokens, 15);
        // Requested model fills in when the response omits one.
        assert_eq!(result.model, "fallback-model");
    }

    #[test]
    fn test_fragment_content_is_joined() {
        let result = parse(serde_json::json!({
            "choices": [{
                "message": {"content": [{"text": "part one"}, {"text": "part two"}]}
            }]
        }));
        assert_eq!(result.message.content, "part one\npart two");
    }

    #[test]
    fn test_missing_choices_is_an_error() {
        let wire: WireResponse =
            serde_json::from_value(serde_json::json!({"choices": []})).expect("wire parses");
        let err = OpenRouterClient::into_result(wire, "m").expect_err("fails");
        assert!(matches!(err, LlmError::EmptyResponse));
    }

    #[test]
    fn test_request_skips_absent_options() {
        let request = ChatRequest::new("m", vec![ChatMessage::user("hi")]);
        let json = serde_json::to_value(&request).expect("serializes");
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("response_format").is_none());
        assert_eq!(json["temperature"], 0.0);
    }
}
