//! The phase coordinator.
//!
//! `step` runs exactly one phase for one simulation:
//!
//! 1. Acquire the simulation's lock
//! 2. Load the simulation (`NotFound` if absent)
//! 3. Reject terminal simulations (`TerminalState`)
//! 4. Resolve the phase to run and, when sequence enforcement is on, check
//!    it against the recorded phase (`UnexpectedPhase`)
//! 5. Dispatch to the registered handler
//! 6. Apply the result: phase log, cycle counter, completion, next phase
//! 7. Persist the simulation (`PersistenceFailed`)
//! 8. Publish a notification
//!
//! The notification is published before the lock is released, so
//! subscribers observe transitions of one simulation in the order they were
//! persisted.

use std::sync::Arc;

use chrono::Utc;
use chronicle_gateway::Gateway;
use chronicle_scenario::ScenarioRegistry;
use chronicle_store::EntityStore;
use chronicle_types::{Phase, PhaseLogEntry, Simulation, SimulationId, SimulationStatus};
use tracing::{debug, info, warn};

use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;
use crate::locks::{LockTable, SimulationGuard};
use crate::notify::{NotificationHub, StreamEvent, events};
use crate::phase::{PhaseContext, PhaseRegistry, PhaseResult};

/// Drives simulations through the canonical phase cycle.
pub struct Coordinator {
    store: EntityStore,
    gateway: Option<Gateway>,
    scenarios: ScenarioRegistry,
    phases: PhaseRegistry,
    locks: LockTable,
    hub: Arc<NotificationHub>,
    settings: CoordinatorConfig,
}

impl Coordinator {
    /// Create a coordinator with the standard phase registry.
    pub fn new(
        store: EntityStore,
        gateway: Option<Gateway>,
        scenarios: ScenarioRegistry,
        settings: CoordinatorConfig,
        hub: Arc<NotificationHub>,
    ) -> Self {
        Self {
            store,
            gateway,
            scenarios,
            phases: PhaseRegistry::standard(),
            locks: LockTable::new(),
            hub,
            settings,
        }
    }

    /// Replace the phase registry.
    #[must_use]
    pub fn with_phases(mut self, phases: PhaseRegistry) -> Self {
        self.phases = phases;
        self
    }

    /// The Entity Store.
    pub const fn store(&self) -> &EntityStore {
        &self.store
    }

    /// The gateway, when configured.
    pub const fn gateway(&self) -> Option<&Gateway> {
        self.gateway.as_ref()
    }

    /// The scenario registry.
    pub const fn scenarios(&self) -> &ScenarioRegistry {
        &self.scenarios
    }

    /// The notification hub.
    pub const fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    /// Coordinator settings.
    pub const fn settings(&self) -> &CoordinatorConfig {
        &self.settings
    }

    /// Number of per-simulation locks created so far.
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    // -----------------------------------------------------------------------
    // Phase cycle
    // -----------------------------------------------------------------------

    /// Execute one phase of `simulation_id`.
    ///
    /// Runs `force_phase` when given, otherwise the simulation's recorded
    /// phase.
    pub async fn step(
        &self,
        simulation_id: &SimulationId,
        force_phase: Option<Phase>,
    ) -> Result<PhaseResult, CoordinatorError> {
        let _guard = self.lock(simulation_id).await;
        let simulation = self.load(simulation_id).await?;

        if simulation.status.is_terminal() {
            return Err(CoordinatorError::TerminalState {
                simulation_id: simulation.id,
                status: simulation.status,
            });
        }

        let phase = force_phase.unwrap_or(simulation.current_phase);
        if self.settings.enforce_phase_sequence
            && (!phase.is_canonical() || phase != simulation.current_phase)
        {
            return Err(CoordinatorError::UnexpectedPhase {
                simulation_id: simulation.id,
                expected: simulation.current_phase,
                requested: phase,
            });
        }

        let handler = self.phases.get(phase)?;
        let previous_status = simulation.status;
        debug!(simulation_id = %simulation_id, phase = %phase, "dispatching phase");

        let ctx = PhaseContext {
            simulation,
            store: &self.store,
            gateway: self.gateway.as_ref(),
            scenarios: &self.scenarios,
            snapshot_history_limit: self.settings.snapshot_history_limit,
        };
        let mut result = handler.run(ctx).await?;
        self.apply(&mut result);
        self.persist(&result.simulation).await?;

        info!(
            simulation_id = %simulation_id,
            phase = %result.executed_phase,
            next_phase = %result.next_phase,
            cycle = result.simulation.cycle_number,
            status = %result.simulation.status,
            "phase executed"
        );

        let event = transition_event(previous_status, result.simulation.status);
        self.publish(
            &StreamEvent::for_simulation(event, &result.simulation)
                .with_phase_result(result.report()),
        );
        Ok(result)
    }

    /// Step through phases until a snapshot completes one cycle.
    ///
    /// Stops early, without error, when the simulation is terminal, paused,
    /// or sitting on a phase outside the canonical sequence.
    pub async fn run_cycle(
        &self,
        simulation_id: &SimulationId,
    ) -> Result<Vec<PhaseResult>, CoordinatorError> {
        let mut results = Vec::new();
        loop {
            let simulation = self.load(simulation_id).await?;
            if simulation.status.is_terminal() || simulation.status == SimulationStatus::Paused {
                debug!(
                    simulation_id = %simulation_id,
                    status = %simulation.status,
                    "cycle stopped"
                );
                break;
            }
            if !simulation.current_phase.is_canonical() {
                warn!(
                    simulation_id = %simulation_id,
                    phase = %simulation.current_phase,
                    "cycle stopped at non-canonical phase"
                );
                break;
            }

            let result = self.step(simulation_id, None).await?;
            let closed = result.executed_phase == Phase::Snapshot;
            results.push(result);
            if closed {
                break;
            }
        }
        Ok(results)
    }

    /// Fold a handler result into its simulation.
    fn apply(&self, result: &mut PhaseResult) {
        let simulation = &mut result.simulation;

        if self.settings.persist_phase_notes && !result.notes.is_empty() {
            simulation.metadata.phase_log.push(PhaseLogEntry {
                phase: result.executed_phase,
                timestamp: Utc::now(),
                notes: result.notes.clone(),
            });
        }

        if result.executed_phase == Phase::Snapshot {
            simulation.cycle_number = simulation.cycle_number.saturating_add(1);
            if simulation.cycle_number >= simulation.max_cycles {
                simulation.complete();
                result.next_phase = Phase::Completed;
            }
        }

        match simulation.status {
            SimulationStatus::Running => simulation.current_phase = result.next_phase,
            SimulationStatus::Completed => simulation.current_phase = Phase::Completed,
            _ => {}
        }
        simulation.touch();
    }

    // -----------------------------------------------------------------------
    // Shared plumbing
    // -----------------------------------------------------------------------

    /// Wait for exclusive access to one simulation.
    pub(crate) async fn lock(&self, simulation_id: &SimulationId) -> SimulationGuard {
        self.locks.acquire(simulation_id).await
    }

    /// Load a simulation or fail with `NotFound`.
    pub(crate) async fn load(
        &self,
        simulation_id: &SimulationId,
    ) -> Result<Simulation, CoordinatorError> {
        self.store
            .simulations()
            .get(simulation_id.as_str())
            .await?
            .ok_or_else(|| CoordinatorError::simulation_not_found(simulation_id))
    }

    /// Write a simulation back after a mutation.
    pub(crate) async fn persist(&self, simulation: &Simulation) -> Result<(), CoordinatorError> {
        match self.store.simulations().save(simulation).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(CoordinatorError::simulation_not_found(&simulation.id)),
            Err(source) => Err(CoordinatorError::PersistenceFailed {
                simulation_id: simulation.id.clone(),
                source,
            }),
        }
    }

    /// Fan a notification out to the simulation's subscribers.
    pub(crate) fn publish(&self, event: &StreamEvent) {
        self.hub.publish(event);
    }
}

/// The notification name for a phase transition.
const fn transition_event(before: SimulationStatus, after: SimulationStatus) -> &'static str {
    match (before, after) {
        (_, SimulationStatus::Completed) => events::COMPLETED,
        (SimulationStatus::Created, SimulationStatus::Running) => events::STARTED,
        _ => events::PHASE_ADVANCED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_event_names() {
        assert_eq!(
            transition_event(SimulationStatus::Created, SimulationStatus::Running),
            events::STARTED
        );
        assert_eq!(
            transition_event(SimulationStatus::Running, SimulationStatus::Completed),
            events::COMPLETED
        );
        assert_eq!(
            transition_event(SimulationStatus::Running, SimulationStatus::Running),
            events::PHASE_ADVANCED
        );
    }
}
