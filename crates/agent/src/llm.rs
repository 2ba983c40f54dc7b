use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use dealerdesk_core::domain::analytics::TokenUsage;
use dealerdesk_core::domain::message::{Message, ToolCall};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("completion transport error: {0}")]
    Transport(String),
    #[error("completion API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not parse completion response: {0}")]
    Parse(String),
}

/// One assistant turn plus the token accounting that produced it.
#[derive(Clone, Debug)]
pub struct ChatCompletion {
    pub message: Message,
    pub usage: TokenUsage,
}

/// Completion backend seam. The engine and summarizer only see this trait,
/// so tests script turns without a network and the provider can be swapped.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Model identifier recorded against analytics rows.
    fn model(&self) -> &str;

    /// One completion round over the transcript. `tools` carries function
    /// definitions in the provider's wire shape; empty means no tools.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Value],
    ) -> Result<ChatCompletion, LlmError>;

    /// Completion constrained to emit a single JSON object.
    async fn complete_json(&self, messages: &[Message]) -> Result<ChatCompletion, LlmError>;
}

/// Chat-completions client for OpenAI-compatible endpoints.
///
/// Requests are attempted exactly once under the configured timeout. Retry
/// policy, if any, belongs to callers that can judge idempotency.
pub struct OpenAiChatClient {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl OpenAiChatClient {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    async fn request(&self, body: Value) -> Result<ChatCompletion, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let wire: WireResponse =
            response.json().await.map_err(|error| LlmError::Parse(error.to_string()))?;
        wire.into_completion()
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Value],
    ) -> Result<ChatCompletion, LlmError> {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
            body["tool_choice"] = json!("auto");
        }
        self.request(body).await
    }

    async fn complete_json(&self, messages: &[Message]) -> Result<ChatCompletion, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "response_format": { "type": "json_object" },
        });
        self.request(body).await
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

impl WireResponse {
    fn into_completion(mut self) -> Result<ChatCompletion, LlmError> {
        if self.choices.is_empty() {
            return Err(LlmError::Parse("response carried no choices".to_string()));
        }
        let wire = self.choices.remove(0).message;

        Ok(ChatCompletion {
            message: Message::Assistant {
                content: wire.content,
                tool_calls: wire.tool_calls.unwrap_or_default(),
            },
            usage: self.usage.unwrap_or_default(),
        })
    }
}
