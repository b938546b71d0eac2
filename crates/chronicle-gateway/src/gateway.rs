//! The gateway facade: provider fallback, retries, and structured requests.

use std::time::Duration;

use tracing::{debug, warn};

use crate::backend::{GatewayBackend, create_backend};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::message::{CompletionOptions, GatewayMessage, GatewayReply};
use crate::parse::{parse_json_array, parse_json_object};
use crate::prompt::{PromptContext, PromptEngine, PromptTask};
use crate::reply::{ActionOutcome, GeneratedEvent, WorldUpdatePlan, decode_each};
#[cfg(any(test, feature = "test-util"))]
use crate::scripted::ScriptedBackend;

/// Most events accepted from one generation request.
pub const MAX_GENERATED_EVENTS: usize = 3;

/// Default pause between attempts, multiplied by the attempt number.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Sends requests to the configured providers, in order, until one answers.
///
/// Each provider gets up to its `max_retries` attempts for retryable
/// failures (transport errors, 5xx). A rate limit moves straight to the
/// next provider. When every provider fails the last error is returned.
pub struct Gateway {
    backends: Vec<GatewayBackend>,
    prompts: PromptEngine,
    options: CompletionOptions,
    retry_delay: Duration,
}

impl Gateway {
    /// Build a gateway over `backends`, tried in order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NoProviders`] if `backends` is empty, or
    /// [`GatewayError::Template`] if the built-in templates fail to load.
    pub fn new(backends: Vec<GatewayBackend>) -> Result<Self, GatewayError> {
        if backends.is_empty() {
            return Err(GatewayError::NoProviders);
        }
        Ok(Self {
            backends,
            prompts: PromptEngine::new()?,
            options: CompletionOptions::default(),
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Build the HTTP backends described by `config`.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let backends = config
            .providers()
            .map(create_backend)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(backends)
    }

    /// A gateway that replays `script` instead of calling a provider.
    #[cfg(any(test, feature = "test-util"))]
    pub fn scripted(script: ScriptedBackend) -> Result<Self, GatewayError> {
        Self::new(vec![GatewayBackend::Scripted(script)]).map(|g| g.with_retry_delay(Duration::ZERO))
    }

    /// Override the base delay between attempts.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Provider labels in the order they are tried.
    pub fn providers(&self) -> Vec<&str> {
        self.backends.iter().map(GatewayBackend::provider).collect()
    }

    /// Send `messages` to the first provider that answers.
    pub async fn complete(
        &self,
        messages: &[GatewayMessage],
    ) -> Result<GatewayReply, GatewayError> {
        let mut last_error = None;

        for backend in &self.backends {
            let attempts = backend.max_retries().max(1);
            let mut attempt: u32 = 1;
            loop {
                match backend.complete(messages, &self.options).await {
                    Ok(reply) => {
                        debug!(
                            provider = backend.provider(),
                            model = %reply.model,
                            attempt,
                            "completion received"
                        );
                        return Ok(reply);
                    }
                    Err(e) => {
                        let retry = e.is_retryable() && attempt < attempts;
                        warn!(
                            provider = backend.provider(),
                            attempt,
                            retry,
                            error = %e,
                            "completion attempt failed"
                        );
                        if !retry {
                            last_error = Some(e);
                            break;
                        }
                        tokio::time::sleep(self.retry_delay.saturating_mul(attempt)).await;
                        attempt = attempt.saturating_add(1);
                    }
                }
            }
        }

        Err(last_error.unwrap_or(GatewayError::NoProviders))
    }

    /// Send one short request and succeed if any provider answers.
    pub async fn check(&self) -> Result<(), GatewayError> {
        let reply = self
            .complete(&[GatewayMessage::user("Reply with the single word: ok")])
            .await?;
        debug!(provider = %reply.provider, "gateway check answered");
        Ok(())
    }

    async fn request(&self, task: PromptTask, context: &PromptContext) -> Result<String, GatewayError> {
        let prompt = self.prompts.render(task, context)?;
        let reply = self.complete(&prompt.messages()).await?;
        Ok(reply.content)
    }

    /// Ask for up to [`MAX_GENERATED_EVENTS`] new events.
    ///
    /// An unparseable reply yields no events rather than an error.
    pub async fn generate_events(
        &self,
        context: &PromptContext,
    ) -> Result<Vec<GeneratedEvent>, GatewayError> {
        let raw = self.request(PromptTask::EventGeneration, context).await?;
        let mut events: Vec<GeneratedEvent> = decode_each("generated event", parse_json_array(&raw));
        events.truncate(MAX_GENERATED_EVENTS);
        Ok(events)
    }

    /// Ask for the outcome of every pending action in `context`.
    ///
    /// An unparseable reply yields no outcomes rather than an error.
    pub async fn resolve_actions(
        &self,
        context: &PromptContext,
    ) -> Result<Vec<ActionOutcome>, GatewayError> {
        let raw = self.request(PromptTask::ActionResolution, context).await?;
        Ok(decode_each("action outcome", parse_json_array(&raw)))
    }

    /// Ask how the events in `context` change actors and the world.
    ///
    /// An unparseable reply yields an empty plan rather than an error.
    pub async fn plan_world_update(
        &self,
        context: &PromptContext,
    ) -> Result<WorldUpdatePlan, GatewayError> {
        let raw = self.request(PromptTask::WorldUpdate, context).await?;
        Ok(WorldUpdatePlan::from_reply(parse_json_object(&raw)))
    }
}
