//! A backend that replays canned replies, for tests and offline runs.
//!
//! Compiled only for this crate's tests and under the `test-util` feature,
//! so release builds carry no way to fake provider replies.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::GatewayError;
use crate::message::{GatewayMessage, GatewayReply};

/// One canned outcome for the scripted backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    /// Reply with this completion text.
    Content(String),
    /// Fail as if the provider returned HTTP 429.
    RateLimited,
    /// Fail with this HTTP status.
    Status(u16),
    /// Fail as if the connection dropped.
    Transport(String),
}

impl ScriptedReply {
    /// Shorthand for [`ScriptedReply::Content`].
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content(text.into())
    }

    fn into_result(self) -> Result<GatewayReply, GatewayError> {
        let provider = "scripted".to_owned();
        match self {
            Self::Content(content) => Ok(GatewayReply {
                content,
                model: "scripted".to_owned(),
                provider,
                usage: None,
                finish_reason: Some("stop".to_owned()),
            }),
            Self::RateLimited => Err(GatewayError::RateLimited { provider }),
            Self::Status(status) => Err(GatewayError::Status {
                provider,
                status,
                body: String::new(),
            }),
            Self::Transport(message) => Err(GatewayError::Transport { provider, message }),
        }
    }
}

#[derive(Debug)]
struct Script {
    queue: Mutex<VecDeque<ScriptedReply>>,
    exhausted: ScriptedReply,
    calls: AtomicUsize,
    last_request: Mutex<Vec<GatewayMessage>>,
}

/// Replays a fixed sequence of replies, then repeats a final one.
///
/// Cloning shares the script, so a test can keep a handle to inspect
/// [`ScriptedBackend::calls`] after handing the backend to a gateway.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    script: Arc<Script>,
    max_retries: u32,
}

impl ScriptedBackend {
    /// Replay `replies` in order; once exhausted every call fails with a
    /// transport error.
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self::with_exhausted(
            replies,
            ScriptedReply::Transport("script exhausted".to_owned()),
        )
    }

    /// Replay `replies` in order, then answer every further call with
    /// `exhausted`.
    pub fn with_exhausted(
        replies: impl IntoIterator<Item = ScriptedReply>,
        exhausted: ScriptedReply,
    ) -> Self {
        Self {
            script: Arc::new(Script {
                queue: Mutex::new(replies.into_iter().collect()),
                exhausted,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(Vec::new()),
            }),
            max_retries: 1,
        }
    }

    /// Allow `attempts` tries per gateway request instead of one.
    #[must_use]
    pub const fn with_max_retries(mut self, attempts: u32) -> Self {
        self.max_retries = attempts;
        self
    }

    /// Answer every call with `reply`.
    pub fn always(reply: ScriptedReply) -> Self {
        Self::with_exhausted(Vec::new(), reply)
    }

    pub(crate) const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// How many completions have been requested.
    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    /// The messages of the most recent request.
    pub fn last_request(&self) -> Vec<GatewayMessage> {
        self.script
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn complete(&self, messages: &[GatewayMessage]) -> Result<GatewayReply, GatewayError> {
        self.script.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .script
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = messages.to_vec();
        let next = self
            .script
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.script.exhausted.clone());
        next.into_result()
    }
}
