//! Phase dispatch: the handler registry and the values handlers exchange
//! with the coordinator.
//!
//! Each canonical phase maps to exactly one [`PhaseHandler`] variant. The
//! registry is built once when the coordinator is constructed; a second
//! handler for the same phase is rejected there rather than at dispatch
//! time.

use std::collections::HashMap;

use chronicle_gateway::Gateway;
use chronicle_scenario::ScenarioRegistry;
use chronicle_store::EntityStore;
use chronicle_types::{ActionId, EventId, Phase, Simulation};
use serde::Serialize;

use crate::error::CoordinatorError;
use crate::handlers;

// ---------------------------------------------------------------------------
// Context and result
// ---------------------------------------------------------------------------

/// Everything a phase handler may read or mutate.
pub struct PhaseContext<'a> {
    /// The simulation, loaded under its lock. Handlers mutate it in place
    /// and hand it back through [`PhaseResult::simulation`].
    pub simulation: Simulation,
    /// Entity persistence.
    pub store: &'a EntityStore,
    /// Optional generative-text gateway.
    pub gateway: Option<&'a Gateway>,
    /// Scenario lookup for seeding and hooks.
    pub scenarios: &'a ScenarioRegistry,
    /// Snapshot history bound, if any.
    pub snapshot_history_limit: Option<usize>,
}

/// What a handler did and which phase it proposes next.
#[derive(Debug, Clone)]
pub struct PhaseResult {
    /// The simulation after the handler ran.
    pub simulation: Simulation,
    /// The phase that executed.
    pub executed_phase: Phase,
    /// The proposed next phase. The coordinator may override it with
    /// `completed` when the cycle limit is reached.
    pub next_phase: Phase,
    /// Events created during the phase.
    pub generated_event_ids: Vec<EventId>,
    /// Actions created during the phase.
    pub generated_action_ids: Vec<ActionId>,
    /// Free-text notes appended to the phase log.
    pub notes: Vec<String>,
}

impl PhaseResult {
    /// A result proposing the canonical successor of `executed_phase`.
    pub fn new(simulation: Simulation, executed_phase: Phase) -> Self {
        Self {
            simulation,
            executed_phase,
            next_phase: executed_phase.canonical_next().unwrap_or(executed_phase),
            generated_event_ids: Vec::new(),
            generated_action_ids: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Append a note.
    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// The serializable part of this result.
    pub fn report(&self) -> PhaseReport {
        PhaseReport {
            executed_phase: self.executed_phase,
            next_phase: self.next_phase,
            cycle_number: self.simulation.cycle_number,
            generated_event_ids: self.generated_event_ids.clone(),
            generated_action_ids: self.generated_action_ids.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// A [`PhaseResult`] without the simulation body, for notifications and
/// API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    /// The phase that executed.
    pub executed_phase: Phase,
    /// The phase recorded as next.
    pub next_phase: Phase,
    /// Cycle number after the phase was applied.
    pub cycle_number: u64,
    /// Events created during the phase.
    pub generated_event_ids: Vec<EventId>,
    /// Actions created during the phase.
    pub generated_action_ids: Vec<ActionId>,
    /// Handler notes.
    pub notes: Vec<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// One handler per canonical phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseHandler {
    /// Start or resume.
    Initialize,
    /// Seed the scenario or generate events.
    EventGeneration,
    /// Reconcile pending actions.
    ActionCollection,
    /// Resolve pending actions.
    ActionResolution,
    /// Apply event effects and resolve events.
    WorldUpdate,
    /// Record a snapshot.
    Snapshot,
}

impl PhaseHandler {
    /// Every handler, in cycle order.
    pub const ALL: [Self; 6] = [
        Self::Initialize,
        Self::EventGeneration,
        Self::ActionCollection,
        Self::ActionResolution,
        Self::WorldUpdate,
        Self::Snapshot,
    ];

    /// The phase this handler executes.
    pub const fn phase(self) -> Phase {
        match self {
            Self::Initialize => Phase::Initialize,
            Self::EventGeneration => Phase::EventGeneration,
            Self::ActionCollection => Phase::ActionCollection,
            Self::ActionResolution => Phase::ActionResolution,
            Self::WorldUpdate => Phase::WorldUpdate,
            Self::Snapshot => Phase::Snapshot,
        }
    }

    /// Run the handler.
    pub async fn run(self, ctx: PhaseContext<'_>) -> Result<PhaseResult, CoordinatorError> {
        match self {
            Self::Initialize => Ok(handlers::initialize(ctx)),
            Self::EventGeneration => handlers::event_generation(ctx).await,
            Self::ActionCollection => handlers::action_collection(ctx).await,
            Self::ActionResolution => handlers::action_resolution(ctx).await,
            Self::WorldUpdate => handlers::world_update(ctx).await,
            Self::Snapshot => handlers::snapshot(ctx).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Phase to handler map, fixed at construction.
#[derive(Debug, Clone)]
pub struct PhaseRegistry {
    handlers: HashMap<Phase, PhaseHandler>,
}

impl Default for PhaseRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl PhaseRegistry {
    /// Build a registry, rejecting two handlers for the same phase.
    pub fn new(handlers: impl IntoIterator<Item = PhaseHandler>) -> Result<Self, CoordinatorError> {
        let mut map = HashMap::new();
        for handler in handlers {
            let phase = handler.phase();
            if map.insert(phase, handler).is_some() {
                return Err(CoordinatorError::DuplicateHandler { phase });
            }
        }
        Ok(Self { handlers: map })
    }

    /// The registry with one handler for every canonical phase.
    pub fn standard() -> Self {
        Self {
            handlers: PhaseHandler::ALL.into_iter().map(|h| (h.phase(), h)).collect(),
        }
    }

    /// The handler for `phase`.
    pub fn get(&self, phase: Phase) -> Result<PhaseHandler, CoordinatorError> {
        self.handlers
            .get(&phase)
            .copied()
            .ok_or(CoordinatorError::MissingHandler { phase })
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn standard_covers_every_canonical_phase() {
        let registry = PhaseRegistry::standard();
        assert_eq!(registry.len(), Phase::CANONICAL.len());
        for phase in Phase::CANONICAL {
            assert_eq!(registry.get(phase).unwrap().phase(), phase);
        }
    }

    #[test]
    fn duplicate_handler_is_rejected() {
        let result = PhaseRegistry::new([
            PhaseHandler::Initialize,
            PhaseHandler::Snapshot,
            PhaseHandler::Initialize,
        ]);
        assert!(matches!(
            result,
            Err(CoordinatorError::DuplicateHandler {
                phase: Phase::Initialize
            })
        ));
    }

    #[test]
    fn missing_handler_is_reported() {
        let registry = PhaseRegistry::new([PhaseHandler::Initialize]).unwrap();
        assert!(matches!(
            registry.get(Phase::Snapshot),
            Err(CoordinatorError::MissingHandler {
                phase: Phase::Snapshot
            })
        ));
        assert!(registry.get(Phase::Paused).is_err());
    }

    #[test]
    fn new_result_proposes_canonical_successor() {
        let sim = Simulation::new("sim-1".into(), "t", "simple_town", 1);
        let result = PhaseResult::new(sim, Phase::Snapshot);
        assert_eq!(result.next_phase, Phase::EventGeneration);
    }
}
