//! Error types for the Observer API server.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chronicle_core::CoordinatorError;
use chronicle_types::{Phase, UnknownVariant};

/// Errors that can occur in the Observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The coordinator or runtime rejected the operation.
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    /// A request body failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// A phase name in the request did not parse.
    #[error("invalid phase: {0}")]
    InvalidPhase(#[from] UnknownVariant),

    /// The requested phase is not part of the cycle and cannot be run.
    #[error("phase {0} cannot be requested")]
    NonCanonicalPhase(Phase),
}

impl ObserverError {
    /// The HTTP status this error maps to.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Coordinator(CoordinatorError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Coordinator(
                CoordinatorError::TerminalState { .. } | CoordinatorError::UnexpectedPhase { .. },
            ) => StatusCode::CONFLICT,
            Self::Coordinator(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) | Self::InvalidPhase(_) | Self::NonCanonicalPhase(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chronicle_types::SimulationStatus;

    use super::*;

    #[test]
    fn coordinator_errors_map_to_http_statuses() {
        let missing = ObserverError::from(CoordinatorError::NotFound {
            kind: "simulation",
            id: "sim-00000000".to_owned(),
        });
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let terminal = ObserverError::from(CoordinatorError::TerminalState {
            simulation_id: "sim-00000000".into(),
            status: SimulationStatus::Completed,
        });
        assert_eq!(terminal.status(), StatusCode::CONFLICT);

        let out_of_order = ObserverError::from(CoordinatorError::UnexpectedPhase {
            simulation_id: "sim-00000000".into(),
            expected: Phase::Initialize,
            requested: Phase::Snapshot,
        });
        assert_eq!(out_of_order.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn bad_phase_is_unprocessable() {
        let err = ObserverError::from("sideways".parse::<Phase>().unwrap_err());
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let paused = ObserverError::NonCanonicalPhase(Phase::Paused);
        assert_eq!(paused.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
