//! Structured simulation metadata.
//!
//! The phase log, scenario-seeding marker, and snapshot history are known
//! fields. Anything else a collaborator wants to carry lives in
//! [`SimulationMetadata::extra`] and round-trips untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::Phase;

/// One entry in the append-only phase log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PhaseLogEntry {
    /// The phase that executed.
    pub phase: Phase,
    /// When the coordinator applied the phase result.
    pub timestamp: DateTime<Utc>,
    /// Free-text notes produced by the phase handler.
    pub notes: Vec<String>,
}

/// Marker recording that a scenario has seeded this simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ScenarioMarker {
    /// Whether the initial batch has been persisted.
    pub seeded: bool,
    /// Normalized key of the scenario that seeded the simulation.
    pub scenario_key: String,
    /// When seeding completed.
    pub seeded_at: Option<DateTime<Utc>>,
}

/// A lightweight point-in-time summary recorded by the snapshot phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SnapshotRecord {
    /// The cycle number at the moment the snapshot was taken.
    pub cycle_number: u64,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// Number of active actors.
    pub actor_count: u32,
    /// Number of pending events.
    pub pending_event_count: u32,
    /// Number of pending actions.
    pub pending_action_count: u32,
    /// Human-readable summary line.
    pub summary: String,
}

/// Known metadata fields plus a passthrough map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationMetadata {
    /// Ordered, append-only log of executed phases.
    #[serde(default)]
    pub phase_log: Vec<PhaseLogEntry>,
    /// Scenario-seeding marker, absent until the first event generation.
    #[serde(default)]
    pub scenario: Option<ScenarioMarker>,
    /// Snapshot history, oldest first.
    #[serde(default)]
    pub snapshots: Vec<SnapshotRecord>,
    /// The phase the simulation was in when it was paused.
    #[serde(default)]
    pub paused_from: Option<Phase>,
    /// When the event generation phase last ran.
    #[serde(default)]
    pub last_event_generation_at: Option<DateTime<Utc>>,
    /// Forward-compatible passthrough data.
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SimulationMetadata {
    /// Whether the scenario seeder has already populated this simulation.
    pub fn is_seeded(&self) -> bool {
        self.scenario.as_ref().is_some_and(|m| m.seeded)
    }

    /// Append a snapshot, dropping the oldest entries beyond `limit`.
    pub fn push_snapshot(&mut self, record: SnapshotRecord, limit: Option<usize>) {
        self.snapshots.push(record);
        if let Some(limit) = limit {
            let excess = self.snapshots.len().saturating_sub(limit);
            if excess > 0 {
                self.snapshots.drain(..excess);
            }
        }
    }
}
