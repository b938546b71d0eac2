//! Enumeration types for simulations, phases, actors, events, and actions.
//!
//! Every enum serializes as its `snake_case` name so stored documents and
//! notification payloads stay readable (`"event_generation"`, `"npc"`).

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    /// The enum being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} value: {}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Generates `as_str`, [`fmt::Display`] and [`FromStr`] for a unit-only enum.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// The `snake_case` wire name of this variant.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Simulation lifecycle
// ---------------------------------------------------------------------------

/// Overall status of a simulation.
///
/// `Created` is the initial status. `Completed` and `Error` are terminal:
/// no phase may execute once either is reached.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SimulationStatus {
    /// Created but never started.
    #[default]
    Created,
    /// Advancing through phases.
    Running,
    /// Suspended by an explicit pause.
    Paused,
    /// Finished, either by reaching `max_cycles` or by explicit completion.
    Completed,
    /// Halted after a recorded error.
    Error,
}

string_enum!(SimulationStatus, "simulation status", {
    Created => "created",
    Running => "running",
    Paused => "paused",
    Completed => "completed",
    Error => "error",
});

impl SimulationStatus {
    /// Whether the status forbids any further phase execution.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// A phase of the simulation cycle, or one of the two absorbing markers.
///
/// The canonical cycle is [`Phase::CANONICAL`]. `Paused` and `Completed` are
/// reachable from any phase through explicit operations but never appear in
/// the cycle itself.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Phase {
    /// Start or resume the simulation.
    #[default]
    Initialize,
    /// Seed the scenario or generate new events.
    EventGeneration,
    /// Reconcile the pending action list.
    ActionCollection,
    /// Resolve each pending action.
    ActionResolution,
    /// Apply event effects and resolve pending events.
    WorldUpdate,
    /// Record a point-in-time summary and close the cycle.
    Snapshot,
    /// Absorbing marker for a paused simulation.
    Paused,
    /// Absorbing marker for a completed simulation.
    Completed,
}

string_enum!(Phase, "phase", {
    Initialize => "initialize",
    EventGeneration => "event_generation",
    ActionCollection => "action_collection",
    ActionResolution => "action_resolution",
    WorldUpdate => "world_update",
    Snapshot => "snapshot",
    Paused => "paused",
    Completed => "completed",
});

impl Phase {
    /// The canonical ordered phase sequence of one cycle.
    pub const CANONICAL: [Self; 6] = [
        Self::Initialize,
        Self::EventGeneration,
        Self::ActionCollection,
        Self::ActionResolution,
        Self::WorldUpdate,
        Self::Snapshot,
    ];

    /// Whether this phase belongs to [`Phase::CANONICAL`].
    pub const fn is_canonical(self) -> bool {
        !matches!(self, Self::Paused | Self::Completed)
    }

    /// The phase that follows this one in the canonical cycle.
    ///
    /// `Snapshot` loops back to `EventGeneration`. The absorbing markers
    /// have no successor.
    pub const fn canonical_next(self) -> Option<Self> {
        match self {
            Self::Initialize => Some(Self::EventGeneration),
            Self::EventGeneration => Some(Self::ActionCollection),
            Self::ActionCollection => Some(Self::ActionResolution),
            Self::ActionResolution => Some(Self::WorldUpdate),
            Self::WorldUpdate => Some(Self::Snapshot),
            Self::Snapshot => Some(Self::EventGeneration),
            Self::Paused | Self::Completed => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Actors
// ---------------------------------------------------------------------------

/// The kind of participant an actor represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ActorType {
    /// Controlled by a human participant.
    Player,
    /// Controlled by the simulation.
    #[default]
    Npc,
    /// A group acting as one participant.
    Organization,
    /// Anything else that can act or be acted upon.
    Entity,
}

string_enum!(ActorType, "actor type", {
    Player => "player",
    Npc => "npc",
    Organization => "organization",
    Entity => "entity",
});

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Category of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EventType {
    /// Weather, disasters, natural change.
    Environmental,
    /// Interpersonal or community happenings.
    Social,
    /// Trade, prices, resources.
    Economic,
    /// Governance and power.
    Political,
    /// Generated by the simulation itself.
    #[default]
    System,
    /// Caused by a player action.
    PlayerAction,
    /// Caused by an NPC action.
    NpcAction,
}

string_enum!(EventType, "event type", {
    Environmental => "environmental",
    Social => "social",
    Economic => "economic",
    Political => "political",
    System => "system",
    PlayerAction => "player_action",
    NpcAction => "npc_action",
});

/// Lifecycle status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EventStatus {
    /// Awaiting resolution.
    #[default]
    Pending,
    /// Approved for resolution.
    Confirmed,
    /// Effects applied.
    Resolved,
    /// Withdrawn without effect.
    Cancelled,
}

string_enum!(EventStatus, "event status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Resolved => "resolved",
    Cancelled => "cancelled",
});

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Category of an actor-initiated action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ActionType {
    /// Speaking, messaging, announcing.
    Communication,
    /// Travel between locations.
    Movement,
    /// Engaging with another actor or object.
    Interaction,
    /// Trading, buying, producing.
    Economic,
    /// Hostile engagement.
    Combat,
    /// Free-form intent.
    #[default]
    Custom,
}

string_enum!(ActionType, "action type", {
    Communication => "communication",
    Movement => "movement",
    Interaction => "interaction",
    Economic => "economic",
    Combat => "combat",
    Custom => "custom",
});

/// Urgency of an action.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ActionPriority {
    /// Resolve when convenient.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// Resolve before normal actions.
    High,
    /// Resolve first.
    Urgent,
}

string_enum!(ActionPriority, "action priority", {
    Low => "low",
    Normal => "normal",
    High => "high",
    Urgent => "urgent",
});

/// Lifecycle status of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ActionStatus {
    /// Submitted, awaiting collection.
    #[default]
    Pending,
    /// Accepted for resolution.
    Approved,
    /// Currently being resolved.
    Executing,
    /// Resolved successfully.
    Completed,
    /// Resolved unsuccessfully.
    Failed,
    /// Withdrawn.
    Cancelled,
}

string_enum!(ActionStatus, "action status", {
    Pending => "pending",
    Approved => "approved",
    Executing => "executing",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl ActionStatus {
    /// Whether the action no longer needs resolution.
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_cycle_loops_back_to_event_generation() {
        let mut phase = Phase::Initialize;
        let mut visited = vec![phase];
        for _ in 0..5 {
            phase = phase.canonical_next().unwrap_or(Phase::Completed);
            visited.push(phase);
        }
        assert_eq!(visited, Phase::CANONICAL.to_vec());
        assert_eq!(Phase::Snapshot.canonical_next(), Some(Phase::EventGeneration));
        assert_eq!(Phase::Paused.canonical_next(), None);
    }

    #[test]
    fn absorbing_markers_are_not_canonical() {
        assert!(!Phase::Paused.is_canonical());
        assert!(!Phase::Completed.is_canonical());
        assert!(Phase::CANONICAL.iter().all(|p| p.is_canonical()));
    }

    #[test]
    fn phase_wire_names_round_trip() {
        for phase in Phase::CANONICAL {
            let json = serde_json::to_string(&phase).unwrap_or_default();
            assert_eq!(json, format!("\"{}\"", phase.as_str()));
            assert_eq!(phase.as_str().parse::<Phase>(), Ok(phase));
        }
    }

    #[test]
    fn parse_is_case_insensitive_and_rejects_unknowns() {
        assert_eq!(" NPC ".parse::<ActorType>(), Ok(ActorType::Npc));
        let err = "wizard".parse::<ActorType>();
        assert!(err.is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(SimulationStatus::Completed.is_terminal());
        assert!(SimulationStatus::Error.is_terminal());
        assert!(!SimulationStatus::Paused.is_terminal());
    }

    #[test]
    fn settled_action_statuses() {
        assert!(ActionStatus::Completed.is_settled());
        assert!(ActionStatus::Cancelled.is_settled());
        assert!(ActionStatus::Failed.is_settled());
        assert!(!ActionStatus::Pending.is_settled());
    }
}
