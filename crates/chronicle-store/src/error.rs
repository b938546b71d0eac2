//! Error types for the Entity Store.
//!
//! Every failure surfaces as a [`StoreError`] carrying the operation, the
//! entity kind, the entity id (when one applies), and the underlying
//! [`StoreFailure`].

use core::fmt;

use crate::entity::EntityKind;

/// The store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Opening or connecting to a backend.
    Open,
    /// `create`.
    Create,
    /// `get`.
    Get,
    /// `update`.
    Update,
    /// `delete`.
    Delete,
    /// `list`.
    List,
    /// `query`.
    Query,
    /// `exists`.
    Exists,
    /// `clear`.
    Clear,
    /// Final flush or disconnect.
    Close,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Create => "create",
            Self::Get => "get",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Query => "query",
            Self::Exists => "exists",
            Self::Clear => "clear",
            Self::Close => "close",
        };
        f.write_str(name)
    }
}

/// The underlying cause of a store failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreFailure {
    /// Reading or writing the local data file failed.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A document could not be encoded or decoded.
    #[error("serialization error: {source}")]
    Serialization {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {source}")]
    Dragonfly {
        /// The underlying client error.
        #[from]
        source: fred::error::Error,
    },

    /// The backend is misconfigured.
    #[error("configuration error: {0}")]
    Config(String),
}

/// A failed Entity Store operation with its context.
#[derive(Debug, thiserror::Error)]
#[error(
    "{operation} {entity_type} {} failed: {cause}",
    .entity_id.as_deref().unwrap_or("*")
)]
pub struct StoreError {
    /// Which operation failed.
    pub operation: Operation,
    /// Which entity kind was involved.
    pub entity_type: EntityKind,
    /// The entity id, for single-entity operations.
    pub entity_id: Option<String>,
    /// What went wrong.
    #[source]
    pub cause: StoreFailure,
}

impl StoreError {
    /// Build an error for `operation` on `entity_type`.
    pub fn new(
        operation: Operation,
        entity_type: EntityKind,
        entity_id: Option<&str>,
        cause: impl Into<StoreFailure>,
    ) -> Self {
        Self {
            operation,
            entity_type,
            entity_id: entity_id.map(ToOwned::to_owned),
            cause: cause.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = StoreError::new(
            Operation::Update,
            EntityKind::Simulation,
            Some("sim-1"),
            StoreFailure::Config("read-only".to_owned()),
        );
        assert_eq!(
            err.to_string(),
            "update simulation sim-1 failed: configuration error: read-only"
        );
    }

    #[test]
    fn display_without_id_uses_wildcard() {
        let err = StoreError::new(
            Operation::List,
            EntityKind::Actor,
            None,
            StoreFailure::Config("offline".to_owned()),
        );
        assert!(err.to_string().starts_with("list actor * failed"));
    }
}
