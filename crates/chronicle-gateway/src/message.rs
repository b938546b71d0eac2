//! Request and reply types exchanged with providers.

use serde::{Deserialize, Serialize};

/// One chat message sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayMessage {
    /// `system`, `user`, or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl GatewayMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_owned(),
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_owned(),
            content: content.into(),
        }
    }
}

/// Token accounting reported by the provider, when it reports any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt.
    pub prompt_tokens: Option<u64>,
    /// Tokens in the completion.
    pub completion_tokens: Option<u64>,
    /// Sum of both, as reported.
    pub total_tokens: Option<u64>,
}

/// A provider's completion, normalised across APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayReply {
    /// Completion text.
    pub content: String,
    /// Model that produced it.
    pub model: String,
    /// Provider label.
    pub provider: String,
    /// Token accounting.
    pub usage: Option<TokenUsage>,
    /// Why generation stopped (`stop`, `length`, `end_turn`, ...).
    pub finish_reason: Option<String>,
}

/// Sampling options for a completion request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion length cap.
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}
