//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup, serving, and shutdown.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: chronicle_core::ConfigError,
    },

    /// Runtime construction failed.
    #[error("runtime error: {source}")]
    Runtime {
        /// The underlying runtime error.
        #[from]
        source: chronicle_core::RuntimeError,
    },

    /// The store could not be flushed on shutdown.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: chronicle_store::StoreError,
    },

    /// The observer server failed to bind or serve.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying server error.
        #[from]
        source: chronicle_observer::ServerError,
    },
}
