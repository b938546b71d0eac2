//! Error types for scenario registration and lookup.

/// Errors raised by the [`crate::ScenarioRegistry`].
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// A scenario with the same normalised key is already registered.
    #[error("scenario '{key}' is already registered")]
    DuplicateScenario {
        /// The normalised key.
        key: String,
    },

    /// Neither the requested scenario nor the default is registered.
    #[error("scenario '{key}' is not registered")]
    UnknownScenario {
        /// The normalised key that was looked up.
        key: String,
    },
}
