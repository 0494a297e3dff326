//! OpenAI-compatible chat completion gateway.
//!
//! Speaks the `POST {base_url}/chat/completions` wire format used by
//! OpenAI, Groq, and most self-hosted inference servers, so backends are
//! swappable through configuration alone.
//!
//! Tool-role turns are serialized as `user` messages carrying the JSON
//! result payload: harbor's tool-call convention is text-based, so the
//! provider never sees a native tool-use schema.

use async_trait::async_trait;
use harbor_application::ports::llm_gateway::{GatewayError, LlmGateway};
use harbor_domain::{Role, Turn};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for the chat provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatProviderConfig {
    /// Base URL, e.g. `https://api.groq.com/openai/v1`.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Model identifier sent with every request.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// HTTP-level request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ChatProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key_env: "HARBOR_API_KEY".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            request_timeout_ms: 60_000,
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireMessage,
}

/// HTTP adapter implementing [`LlmGateway`].
pub struct HttpChatGateway {
    client: reqwest::Client,
    config: ChatProviderConfig,
    api_key: Option<String>,
}

impl HttpChatGateway {
    /// Build the gateway, reading the API key from the configured
    /// environment variable (requests without a key are sent unauthenticated,
    /// which local inference servers accept).
    pub fn new(config: ChatProviderConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to build HTTP client: {}", e)))?;

        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            debug!(var = %config.api_key_env, "No API key in environment; sending unauthenticated requests");
        }

        Ok(Self {
            client,
            config,
            api_key,
        })
    }
}

/// Map the transcript onto the chat-completions message list.
fn wire_messages(system_prompt: Option<&str>, turns: &[Turn]) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(turns.len() + 1);

    if let Some(system) = system_prompt {
        messages.push(WireMessage {
            role: "system".to_string(),
            content: system.to_string(),
        });
    }

    for turn in turns {
        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            // The wire format has no free-standing tool role; results ride
            // as user messages the model reads back.
            Role::Tool => "user",
        };
        messages.push(WireMessage {
            role: role.to_string(),
            content: turn.content.clone(),
        });
    }

    messages
}

/// Classify an HTTP status into the gateway error taxonomy.
fn classify_status(status: reqwest::StatusCode, body: String) -> GatewayError {
    match status.as_u16() {
        401 | 403 => GatewayError::AuthFailed(body),
        429 => GatewayError::RateLimited(body),
        400..=499 => GatewayError::BadRequest(body),
        _ => GatewayError::ServerError(body),
    }
}

#[async_trait]
impl LlmGateway for HttpChatGateway {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        turns: &[Turn],
    ) -> Result<String, GatewayError> {
        let request_body = ChatCompletionRequest {
            model: &self.config.model,
            messages: wire_messages(system_prompt, turns),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(&request_body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::MalformedResponse("no choices in response".to_string()))?;

        debug!(bytes = choice.message.content.len(), "Chat completion received");
        Ok(choice.message.content)
    }
}
