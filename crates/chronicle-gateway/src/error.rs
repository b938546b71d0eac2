//! Error types for the generative-text gateway.
//!
//! Every variant is recoverable from the coordinator's point of view: phase
//! handlers log the error and fall back to their no-gateway behaviour.

/// Errors that can occur while talking to a generative-text provider.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Provider configuration is invalid or incomplete.
    #[error("gateway config error: {0}")]
    Config(String),

    /// The HTTP request could not be sent or the response body not read.
    #[error("{provider} transport error: {message}")]
    Transport {
        /// Provider label.
        provider: String,
        /// Underlying failure.
        message: String,
    },

    /// The provider answered with a non-success status.
    #[error("{provider} returned {status}: {body}")]
    Status {
        /// Provider label.
        provider: String,
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The provider rejected the request with HTTP 429.
    #[error("{provider} rate limit exceeded")]
    RateLimited {
        /// Provider label.
        provider: String,
    },

    /// The provider's response did not have the expected shape.
    #[error("{provider} response malformed: {message}")]
    MalformedResponse {
        /// Provider label.
        provider: String,
        /// What was missing or wrong.
        message: String,
    },

    /// No provider is configured.
    #[error("no generative-text providers are configured")]
    NoProviders,

    /// A prompt template failed to load or render.
    #[error("template render error: {0}")]
    Template(String),
}

impl GatewayError {
    /// Whether another attempt against the same provider may succeed.
    ///
    /// Transport failures and server-side statuses are retried. Rate limits
    /// move straight to the next provider; client errors never succeed on
    /// retry.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Config(_)
            | Self::RateLimited { .. }
            | Self::MalformedResponse { .. }
            | Self::NoProviders
            | Self::Template(_) => false,
        }
    }
}
