//! Generative-text gateway for the Chronicle simulation coordinator.
//!
//! Phase handlers use the gateway to ask a language model for new events,
//! action outcomes, and world changes. Every failure here is recoverable:
//! callers log it and fall back to deterministic behaviour.
//!
//! # Architecture
//!
//! ```text
//! Gateway ---- PromptEngine (minijinja templates)
//!    |
//!    +-- GatewayBackend (primary, then fallbacks)
//!          |-- OpenAiBackend    (OpenRouter, OpenAI, LM Studio, Ollama)
//!          |-- AnthropicBackend (Messages API)
//!          +-- ScriptedBackend  (canned replies, `test-util` only)
//!    |
//! parse (defensive JSON) -> reply (typed, per-item decoding)
//! ```
//!
//! # Modules
//!
//! - [`config`] -- Provider configuration from the environment
//! - [`backend`] -- Enum-dispatched provider backends
//! - [`gateway`] -- [`Gateway`] facade with retries and fallback
//! - [`prompt`] -- Prompt context and template rendering
//! - [`parse`] -- Recovery of JSON from raw replies
//! - [`reply`] -- Typed reply items
//! - `scripted` -- Canned-reply backend (`test-util` feature)
//! - [`message`] -- Request and reply envelopes
//! - [`error`] -- [`GatewayError`]

pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;
pub mod message;
pub mod parse;
pub mod prompt;
pub mod reply;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

pub use backend::{GatewayBackend, create_backend};
pub use config::{GatewayConfig, ProviderConfig, ProviderKind};
pub use error::GatewayError;
pub use gateway::{Gateway, MAX_GENERATED_EVENTS};
pub use message::{CompletionOptions, GatewayMessage, GatewayReply, TokenUsage};
pub use prompt::{PromptContext, PromptEngine, PromptTask, RenderedPrompt};
pub use reply::{ActionOutcome, ActorUpdate, GeneratedEvent, WorldUpdatePlan};
#[cfg(any(test, feature = "test-util"))]
pub use scripted::{ScriptedBackend, ScriptedReply};
