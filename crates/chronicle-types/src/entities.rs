//! Stored entities: [`Simulation`], [`Actor`], [`Event`], [`Action`].
//!
//! Every entity carries `created_at` and `updated_at`. Collection and
//! optional fields default when absent so partially-written documents from
//! other producers still decode.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::enums::{
    ActionPriority, ActionStatus, ActionType, ActorType, EventStatus, EventType, Phase,
    SimulationStatus,
};
use crate::ids::{ActionId, ActorId, EventId, SimulationId};
use crate::metadata::{SimulationMetadata, SnapshotRecord};

/// Free-form key/value map used for attributes, metadata, and parameters.
pub type FieldMap = BTreeMap<String, Value>;

/// Default scenario key for new simulations.
pub const DEFAULT_SCENARIO: &str = "simple_town";

/// Default cycle limit for new simulations.
pub const DEFAULT_MAX_CYCLES: u64 = 20;

fn default_max_cycles() -> u64 {
    DEFAULT_MAX_CYCLES
}

fn default_scenario() -> String {
    DEFAULT_SCENARIO.to_owned()
}

fn default_true() -> bool {
    true
}

fn default_scope() -> String {
    "local".to_owned()
}

fn default_source() -> String {
    "system".to_owned()
}

/// Insert `id` at the end of `ids` unless already present.
fn push_unique<T: PartialEq>(ids: &mut Vec<T>, id: T) -> bool {
    if ids.contains(&id) {
        false
    } else {
        ids.push(id);
        true
    }
}

/// Remove every occurrence of `id` from `ids`.
fn remove_all<T: PartialEq>(ids: &mut Vec<T>, id: &T) -> bool {
    let before = ids.len();
    ids.retain(|existing| existing != id);
    ids.len() != before
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// A single run of the world, with its own phase and cycle counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Simulation {
    /// Unique identifier.
    pub id: SimulationId,
    /// Display name.
    pub name: String,
    /// Optional longer description.
    #[serde(default)]
    pub description: String,
    /// Lifecycle status.
    #[serde(default)]
    pub status: SimulationStatus,
    /// The phase that will run on the next step.
    #[serde(default)]
    pub current_phase: Phase,
    /// Completed cycles. Incremented once per snapshot step, never decreased.
    #[serde(default)]
    pub cycle_number: u64,
    /// Reaching this many cycles forces completion.
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u64,
    /// Key of the scenario that seeds this simulation.
    #[serde(default = "default_scenario")]
    pub scenario_key: String,
    /// Caller-supplied configuration passed through to handlers.
    #[serde(default)]
    pub configuration: FieldMap,
    /// Global world state, merged by the world update phase.
    #[serde(default)]
    pub world_state: FieldMap,
    /// Environmental conditions.
    #[serde(default)]
    pub environment: FieldMap,
    /// Active actors, in registration order.
    #[serde(default)]
    pub active_actor_ids: Vec<ActorId>,
    /// Events awaiting the world update phase, in creation order.
    #[serde(default)]
    pub pending_event_ids: Vec<EventId>,
    /// Actions awaiting resolution, in submission order.
    #[serde(default)]
    pub pending_action_ids: Vec<ActionId>,
    /// Per-phase statistics keyed by phase name.
    #[serde(default)]
    pub phase_statistics: FieldMap,
    /// The most recent recorded error.
    #[serde(default)]
    pub last_error: Option<String>,
    /// Number of recorded errors.
    #[serde(default)]
    pub error_count: u32,
    /// Number of snapshots recorded.
    #[serde(default)]
    pub snapshot_count: u64,
    /// When the last snapshot was recorded.
    #[serde(default)]
    pub last_snapshot_at: Option<DateTime<Utc>>,
    /// Structured metadata (phase log, scenario marker, snapshots).
    #[serde(default)]
    pub metadata: SimulationMetadata,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// First start time.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Completion time.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Simulation {
    /// Create a simulation in its initial state: `created`, `initialize`, cycle 0.
    pub fn new(
        id: SimulationId,
        name: impl Into<String>,
        scenario_key: impl Into<String>,
        max_cycles: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            description: String::new(),
            status: SimulationStatus::Created,
            current_phase: Phase::Initialize,
            cycle_number: 0,
            max_cycles,
            scenario_key: scenario_key.into(),
            configuration: FieldMap::new(),
            world_state: FieldMap::new(),
            environment: FieldMap::new(),
            active_actor_ids: Vec::new(),
            pending_event_ids: Vec::new(),
            pending_action_ids: Vec::new(),
            phase_statistics: FieldMap::new(),
            last_error: None,
            error_count: 0,
            snapshot_count: 0,
            last_snapshot_at: None,
            metadata: SimulationMetadata::default(),
            created_at: now,
            started_at: None,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Refresh `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Transition to `running` and record the first start time.
    pub fn start(&mut self) {
        self.status = SimulationStatus::Running;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.touch();
    }

    /// Suspend the simulation, remembering the phase it was in.
    ///
    /// Pausing an already paused simulation keeps the originally recorded
    /// phase.
    pub fn pause(&mut self) {
        if self.status != SimulationStatus::Paused {
            self.metadata.paused_from = Some(self.current_phase);
        }
        self.status = SimulationStatus::Paused;
        self.current_phase = Phase::Paused;
        self.touch();
    }

    /// Resume a paused simulation at the phase it was paused from.
    ///
    /// Falls back to `initialize` when no phase was recorded. Returns
    /// `false` (and changes nothing) when the simulation is not paused.
    pub fn resume(&mut self) -> bool {
        if self.status != SimulationStatus::Paused {
            return false;
        }
        let phase = self
            .metadata
            .paused_from
            .take()
            .filter(|p| p.is_canonical())
            .unwrap_or(Phase::Initialize);
        self.status = SimulationStatus::Running;
        self.current_phase = phase;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.touch();
        true
    }

    /// Mark the simulation completed.
    pub fn complete(&mut self) {
        let now = Utc::now();
        self.status = SimulationStatus::Completed;
        self.current_phase = Phase::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Record an error and move to the terminal `error` status.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
        self.error_count = self.error_count.saturating_add(1);
        self.status = SimulationStatus::Error;
        self.touch();
    }

    /// Clear a recorded error and return to `running`.
    pub fn clear_error(&mut self) {
        if self.status == SimulationStatus::Error {
            self.last_error = None;
            self.status = SimulationStatus::Running;
            self.touch();
        }
    }

    /// Register an actor. Returns `false` if it was already active.
    pub fn add_actor(&mut self, id: ActorId) -> bool {
        push_unique(&mut self.active_actor_ids, id)
    }

    /// Deregister an actor. Returns `false` if it was not active.
    pub fn remove_actor(&mut self, id: &ActorId) -> bool {
        remove_all(&mut self.active_actor_ids, id)
    }

    /// Queue an event. Returns `false` if it was already pending.
    pub fn add_pending_event(&mut self, id: EventId) -> bool {
        push_unique(&mut self.pending_event_ids, id)
    }

    /// Dequeue an event. Returns `false` if it was not pending.
    pub fn remove_pending_event(&mut self, id: &EventId) -> bool {
        remove_all(&mut self.pending_event_ids, id)
    }

    /// Queue an action. Returns `false` if it was already pending.
    pub fn add_pending_action(&mut self, id: ActionId) -> bool {
        push_unique(&mut self.pending_action_ids, id)
    }

    /// Dequeue an action. Returns `false` if it was not pending.
    pub fn remove_pending_action(&mut self, id: &ActionId) -> bool {
        remove_all(&mut self.pending_action_ids, id)
    }

    /// Merge keys into the world state.
    pub fn update_world_state(&mut self, changes: FieldMap) {
        self.world_state.extend(changes);
        self.touch();
    }

    /// Replace the statistics recorded for one phase.
    pub fn update_phase_statistics(&mut self, phase: Phase, stats: Value) {
        self.phase_statistics.insert(phase.as_str().to_owned(), stats);
        self.touch();
    }

    /// Record a snapshot, bumping the counter and appending to the history.
    pub fn record_snapshot(&mut self, record: SnapshotRecord, history_limit: Option<usize>) {
        self.snapshot_count = self.snapshot_count.saturating_add(1);
        self.last_snapshot_at = Some(record.taken_at);
        self.metadata.push_snapshot(record, history_limit);
        self.touch();
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Attribute, location, and metadata changes to apply to one actor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActorEffects {
    /// Keys merged into the actor's attributes.
    #[serde(default)]
    pub attribute_changes: FieldMap,
    /// Replacement location, when the actor moved.
    #[serde(default)]
    pub location_change: Option<FieldMap>,
    /// Keys merged into the actor's metadata.
    #[serde(default)]
    pub metadata_updates: FieldMap,
}

impl ActorEffects {
    /// Whether applying these effects would change nothing.
    pub fn is_empty(&self) -> bool {
        self.attribute_changes.is_empty()
            && self.location_change.is_none()
            && self.metadata_updates.is_empty()
    }
}

/// A participant entity that can cause or be affected by events and actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Actor {
    /// Unique identifier.
    pub id: ActorId,
    /// Display name.
    pub name: String,
    /// Participant kind.
    #[serde(default, rename = "type")]
    pub actor_type: ActorType,
    /// Free-form attributes (traits, skills, role).
    #[serde(default)]
    pub attributes: FieldMap,
    /// Where the actor currently is, if anywhere.
    #[serde(default)]
    pub location: Option<FieldMap>,
    /// Visibility rules for other participants.
    #[serde(default)]
    pub visibility: FieldMap,
    /// Relationships keyed by other actor id.
    #[serde(default)]
    pub relationships: FieldMap,
    /// Organizations or factions the actor belongs to.
    #[serde(default)]
    pub affiliations: Vec<String>,
    /// Whether the actor participates in new phases.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: FieldMap,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Actor {
    /// Create an active actor with empty attributes.
    pub fn new(id: ActorId, name: impl Into<String>, actor_type: ActorType) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            actor_type,
            attributes: FieldMap::new(),
            location: None,
            visibility: FieldMap::new(),
            relationships: FieldMap::new(),
            affiliations: Vec::new(),
            active: true,
            metadata: FieldMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a set of effects. Returns `true` if anything changed.
    pub fn apply_effects(&mut self, effects: &ActorEffects) -> bool {
        if effects.is_empty() {
            return false;
        }
        self.attributes.extend(
            effects
                .attribute_changes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        if let Some(location) = &effects.location_change {
            self.location = Some(location.clone());
        }
        self.metadata.extend(
            effects
                .metadata_updates
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        self.updated_at = Utc::now();
        true
    }

    /// The location's display name, if the actor has one.
    pub fn location_name(&self) -> Option<&str> {
        self.location
            .as_ref()
            .and_then(|loc| loc.get("name"))
            .and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A discrete occurrence affecting one or more actors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Event {
    /// Unique identifier.
    pub id: EventId,
    /// Short headline.
    pub title: String,
    /// Narrative description.
    #[serde(default)]
    pub description: String,
    /// Category.
    #[serde(default, rename = "type")]
    pub event_type: EventType,
    /// Lifecycle status.
    #[serde(default)]
    pub status: EventStatus,
    /// Actors the event touches.
    #[serde(default)]
    pub affected_actors: Vec<ActorId>,
    /// Where it happens.
    #[serde(default)]
    pub location: Option<FieldMap>,
    /// Reach of the event (`local`, `regional`, `global`).
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Originator (`system`, `gateway`, a scenario key).
    #[serde(default = "default_source")]
    pub source: String,
    /// Event-specific parameters.
    #[serde(default)]
    pub parameters: FieldMap,
    /// Effects to apply when the event resolves, keyed by actor id.
    #[serde(default)]
    pub effects: BTreeMap<String, ActorEffects>,
    /// The event that caused this one.
    #[serde(default)]
    pub trigger_event_id: Option<EventId>,
    /// The action that caused this one.
    #[serde(default)]
    pub trigger_action_id: Option<ActionId>,
    /// When the event should take effect.
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    /// When the event was resolved or cancelled.
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: FieldMap,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Create a pending event.
    pub fn new(id: EventId, title: impl Into<String>, event_type: EventType) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            description: String::new(),
            event_type,
            status: EventStatus::Pending,
            affected_actors: Vec::new(),
            location: None,
            scope: default_scope(),
            source: default_source(),
            parameters: FieldMap::new(),
            effects: BTreeMap::new(),
            trigger_event_id: None,
            trigger_action_id: None,
            scheduled_for: None,
            resolved_at: None,
            metadata: FieldMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the event resolved.
    pub fn resolve(&mut self) {
        let now = Utc::now();
        self.status = EventStatus::Resolved;
        self.resolved_at = Some(now);
        self.updated_at = now;
    }

    /// Cancel the event, recording the reason in metadata.
    pub fn cancel(&mut self, reason: Option<&str>) {
        let now = Utc::now();
        self.status = EventStatus::Cancelled;
        self.resolved_at = Some(now);
        self.updated_at = now;
        if let Some(reason) = reason {
            self.metadata
                .insert("cancellation_reason".to_owned(), Value::from(reason));
        }
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// An actor-initiated intent awaiting resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Action {
    /// Unique identifier.
    pub id: ActionId,
    /// The acting actor.
    pub actor_id: ActorId,
    /// The simulation the action belongs to.
    pub simulation_id: SimulationId,
    /// Category.
    #[serde(default, rename = "type")]
    pub action_type: ActionType,
    /// What the actor wants to achieve.
    pub intent: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// Action-specific parameters.
    #[serde(default)]
    pub parameters: FieldMap,
    /// Urgency.
    #[serde(default)]
    pub priority: ActionPriority,
    /// Lifecycle status.
    #[serde(default)]
    pub status: ActionStatus,
    /// Outcome description once resolved.
    #[serde(default)]
    pub outcome: Option<String>,
    /// When the action was resolved.
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: FieldMap,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Action {
    /// Create a pending action with normal priority.
    pub fn new(
        id: ActionId,
        actor_id: ActorId,
        simulation_id: SimulationId,
        action_type: ActionType,
        intent: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            actor_id,
            simulation_id,
            action_type,
            intent: intent.into(),
            description: String::new(),
            parameters: FieldMap::new(),
            priority: ActionPriority::Normal,
            status: ActionStatus::Pending,
            outcome: None,
            resolved_at: None,
            metadata: FieldMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn settle(&mut self, status: ActionStatus, outcome: Option<String>) {
        let now = Utc::now();
        self.status = status;
        self.outcome = outcome;
        self.resolved_at = Some(now);
        self.updated_at = now;
    }

    /// Mark the action completed with an outcome description.
    pub fn complete(&mut self, outcome: impl Into<String>) {
        self.settle(ActionStatus::Completed, Some(outcome.into()));
    }

    /// Mark the action failed with an outcome description.
    pub fn fail(&mut self, outcome: impl Into<String>) {
        self.settle(ActionStatus::Failed, Some(outcome.into()));
    }

    /// Withdraw the action.
    pub fn cancel(&mut self) {
        self.settle(ActionStatus::Cancelled, None);
    }
}
