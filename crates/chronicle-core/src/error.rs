//! Coordinator error taxonomy.
//!
//! Gateway failures never appear here: phase handlers recover from them
//! locally and return a degraded [`PhaseResult`](crate::phase::PhaseResult).

use chronicle_gateway::GatewayError;
use chronicle_store::StoreError;
use chronicle_types::{ActorId, Phase, SimulationId, SimulationStatus};

/// Errors returned by the phase coordinator and runtime operations.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// A referenced simulation or entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind (`simulation`, `actor`, ...).
        kind: &'static str,
        /// The missing id.
        id: String,
    },

    /// The simulation is completed or errored; no further phases may run.
    #[error("simulation {simulation_id} is in terminal state {status}")]
    TerminalState {
        /// The simulation.
        simulation_id: SimulationId,
        /// Its terminal status.
        status: SimulationStatus,
    },

    /// The requested phase violates the canonical sequence.
    #[error("simulation {simulation_id}: expected phase {expected}, requested {requested}")]
    UnexpectedPhase {
        /// The simulation.
        simulation_id: SimulationId,
        /// The phase recorded on the simulation.
        expected: Phase,
        /// The phase the caller asked for.
        requested: Phase,
    },

    /// An Entity Store operation failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// Writing the simulation back after a successful handler run failed.
    ///
    /// The in-memory state is not rolled back; callers must reload.
    #[error("failed to persist simulation {simulation_id}: {source}")]
    PersistenceFailed {
        /// The simulation.
        simulation_id: SimulationId,
        /// The underlying store error.
        source: StoreError,
    },

    /// Two handlers were registered for the same phase.
    #[error("duplicate handler registered for phase {phase}")]
    DuplicateHandler {
        /// The contested phase.
        phase: Phase,
    },

    /// No handler is registered for the phase being dispatched.
    #[error("no handler registered for phase {phase}")]
    MissingHandler {
        /// The unhandled phase.
        phase: Phase,
    },
}

impl CoordinatorError {
    /// Shorthand for a missing simulation.
    pub fn simulation_not_found(id: &SimulationId) -> Self {
        Self::NotFound {
            kind: "simulation",
            id: id.to_string(),
        }
    }

    /// Shorthand for a missing actor.
    pub fn actor_not_found(id: &ActorId) -> Self {
        Self::NotFound {
            kind: "actor",
            id: id.to_string(),
        }
    }
}

/// Errors raised while constructing the runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The Entity Store backend could not be opened.
    #[error("store initialization failed: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// The generative-text gateway configuration is invalid.
    #[error("gateway initialization failed: {source}")]
    Gateway {
        /// The underlying gateway error.
        #[from]
        source: GatewayError,
    },
}
