//! Compact simulation summaries for listings and notifications.

use chrono::{DateTime, Utc};
use chronicle_types::{Phase, Simulation, SimulationId, SimulationStatus};
use serde::Serialize;

/// Status, phase, cycle, and pending counts of one simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationSummary {
    /// Simulation id.
    pub id: SimulationId,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: SimulationStatus,
    /// Phase that runs on the next step.
    pub current_phase: Phase,
    /// Completed cycles.
    pub cycle_number: u64,
    /// Cycle limit.
    pub max_cycles: u64,
    /// Seeding scenario.
    pub scenario_key: String,
    /// Registered actors.
    pub actor_count: usize,
    /// Events awaiting world update.
    pub pending_event_count: usize,
    /// Actions awaiting resolution.
    pub pending_action_count: usize,
    /// Snapshots recorded so far.
    pub snapshot_count: u64,
    /// Most recent error, if the simulation failed.
    pub last_error: Option<String>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl From<&Simulation> for SimulationSummary {
    fn from(sim: &Simulation) -> Self {
        Self {
            id: sim.id.clone(),
            name: sim.name.clone(),
            status: sim.status,
            current_phase: sim.current_phase,
            cycle_number: sim.cycle_number,
            max_cycles: sim.max_cycles,
            scenario_key: sim.scenario_key.clone(),
            actor_count: sim.active_actor_ids.len(),
            pending_event_count: sim.pending_event_ids.len(),
            pending_action_count: sim.pending_action_ids.len(),
            snapshot_count: sim.snapshot_count,
            last_error: sim.last_error.clone(),
            updated_at: sim.updated_at,
        }
    }
}
