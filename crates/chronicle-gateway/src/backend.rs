//! Provider backend abstraction and implementations.
//!
//! Defines an enum-based dispatch for providers, avoiding the
//! dyn-compatibility issues with async trait methods. Concrete
//! implementations exist for OpenAI-compatible APIs and the Anthropic
//! Messages API, both over HTTP via `reqwest`. With the `test-util` feature a
//! scripted variant replays canned replies instead.

use serde_json::Value;

use crate::config::ProviderConfig;
use crate::error::GatewayError;
use crate::message::{CompletionOptions, GatewayMessage, GatewayReply, TokenUsage};
#[cfg(any(test, feature = "test-util"))]
use crate::scripted::ScriptedBackend;

// ---------------------------------------------------------------------------
// Unified backend enum (dyn-compatible alternative to async trait)
// ---------------------------------------------------------------------------

/// A provider that can turn a list of messages into a completion.
///
/// Uses enum dispatch instead of trait objects because async methods
/// are not dyn-compatible in Rust.
pub enum GatewayBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
    /// Canned replies, no network.
    #[cfg(any(test, feature = "test-util"))]
    Scripted(ScriptedBackend),
}

impl GatewayBackend {
    /// Send `messages` and return the normalised reply.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RateLimited`] on HTTP 429,
    /// [`GatewayError::Status`] on other non-success statuses,
    /// [`GatewayError::Transport`] if the request fails, and
    /// [`GatewayError::MalformedResponse`] if the body lacks the content.
    pub async fn complete(
        &self,
        messages: &[GatewayMessage],
        options: &CompletionOptions,
    ) -> Result<GatewayReply, GatewayError> {
        match self {
            Self::OpenAi(backend) => backend.complete(messages, options).await,
            Self::Anthropic(backend) => backend.complete(messages, options).await,
            #[cfg(any(test, feature = "test-util"))]
            Self::Scripted(backend) => backend.complete(messages),
        }
    }

    /// Provider label for logging.
    pub fn provider(&self) -> &str {
        match self {
            Self::OpenAi(backend) => &backend.provider,
            Self::Anthropic(_) => "anthropic",
            #[cfg(any(test, feature = "test-util"))]
            Self::Scripted(_) => "scripted",
        }
    }

    /// Total attempts allowed against this backend.
    pub const fn max_retries(&self) -> u32 {
        match self {
            Self::OpenAi(backend) => backend.max_retries,
            Self::Anthropic(backend) => backend.max_retries,
            #[cfg(any(test, feature = "test-util"))]
            Self::Scripted(backend) => backend.max_retries(),
        }
    }
}

/// Build a `reqwest` client with the provider's timeout.
fn http_client(config: &ProviderConfig) -> Result<reqwest::Client, GatewayError> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {e}")))
}

/// Map a sent request's response to its JSON body, classifying failures.
async fn read_json(provider: &str, response: reqwest::Response) -> Result<Value, GatewayError> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(GatewayError::RateLimited {
            provider: provider.to_owned(),
        });
    }
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_owned());
        return Err(GatewayError::Status {
            provider: provider.to_owned(),
            status: status.as_u16(),
            body,
        });
    }
    response
        .json()
        .await
        .map_err(|e| GatewayError::Transport {
            provider: provider.to_owned(),
            message: format!("response body unreadable: {e}"),
        })
}

fn transport(provider: &str, e: &reqwest::Error) -> GatewayError {
    GatewayError::Transport {
        provider: provider.to_owned(),
        message: e.to_string(),
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Works with `OpenRouter`, `OpenAI`, LM Studio, and Ollama endpoints.
/// Sends requests to `{base_url}/chat/completions`.
pub struct OpenAiBackend {
    client: reqwest::Client,
    provider: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_retries: u32,
}

impl OpenAiBackend {
    /// Create a new OpenAI-compatible backend.
    pub fn new(config: &ProviderConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            client: http_client(config)?,
            provider: config.kind.label().to_owned(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn complete(
        &self,
        messages: &[GatewayMessage],
        options: &CompletionOptions,
    ) -> Result<GatewayReply, GatewayError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport(&self.provider, &e))?;
        let json = read_json(&self.provider, response).await?;

        extract_openai_reply(&json, &self.provider, &self.model)
    }
}

/// Extract the reply from an `OpenAI` chat completions response.
fn extract_openai_reply(
    json: &Value,
    provider: &str,
    model: &str,
) -> Result<GatewayReply, GatewayError> {
    let choice = json.get("choices").and_then(|c| c.get(0));
    let content = choice
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::MalformedResponse {
            provider: provider.to_owned(),
            message: "missing choices[0].message.content".to_owned(),
        })?;

    let usage = json.get("usage").map(|u| TokenUsage {
        prompt_tokens: u.get("prompt_tokens").and_then(Value::as_u64),
        completion_tokens: u.get("completion_tokens").and_then(Value::as_u64),
        total_tokens: u.get("total_tokens").and_then(Value::as_u64),
    });

    Ok(GatewayReply {
        content: content.to_owned(),
        model: json
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(model)
            .to_owned(),
        provider: provider.to_owned(),
        usage,
        finish_reason: choice
            .and_then(|c| c.get("finish_reason"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
    })
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// Anthropic uses a different request format from `OpenAI`:
/// - Uses `x-api-key` header instead of `Authorization: Bearer`
/// - System messages move to a top-level `system` field
/// - Response structure differs: `content[0].text`
pub struct AnthropicBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl AnthropicBackend {
    /// Create a new Anthropic Messages API backend.
    pub fn new(config: &ProviderConfig) -> Result<Self, GatewayError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| GatewayError::Config("anthropic requires an API key".to_owned()))?;
        Ok(Self {
            client: http_client(config)?,
            base_url: config.base_url.clone(),
            api_key,
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn complete(
        &self,
        messages: &[GatewayMessage],
        options: &CompletionOptions,
    ) -> Result<GatewayReply, GatewayError> {
        let url = format!("{}/messages", self.base_url);

        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect();
        let turns: Vec<&GatewayMessage> = messages.iter().filter(|m| m.role != "system").collect();

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "system": system.join("\n\n"),
            "messages": turns,
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport("anthropic", &e))?;
        let json = read_json("anthropic", response).await?;

        extract_anthropic_reply(&json, &self.model)
    }
}

/// Extract the reply from an Anthropic Messages API response.
fn extract_anthropic_reply(json: &Value, model: &str) -> Result<GatewayReply, GatewayError> {
    let content = json
        .get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::MalformedResponse {
            provider: "anthropic".to_owned(),
            message: "missing content[0].text".to_owned(),
        })?;

    let usage = json.get("usage").map(|u| {
        let input = u.get("input_tokens").and_then(Value::as_u64);
        let output = u.get("output_tokens").and_then(Value::as_u64);
        TokenUsage {
            prompt_tokens: input,
            completion_tokens: output,
            total_tokens: input.zip(output).map(|(i, o)| i.saturating_add(o)),
        }
    });

    Ok(GatewayReply {
        content: content.to_owned(),
        model: json
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(model)
            .to_owned(),
        provider: "anthropic".to_owned(),
        usage,
        finish_reason: json
            .get("stop_reason")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
    })
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Create a backend from provider configuration.
///
/// Dispatches to [`OpenAiBackend`] or [`AnthropicBackend`] based on the
/// configured [`crate::config::ProviderKind`].
pub fn create_backend(config: &ProviderConfig) -> Result<GatewayBackend, GatewayError> {
    if config.kind.is_openai_compatible() {
        Ok(GatewayBackend::OpenAi(OpenAiBackend::new(config)?))
    } else {
        Ok(GatewayBackend::Anthropic(AnthropicBackend::new(config)?))
    }
}
