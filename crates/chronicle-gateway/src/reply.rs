//! Typed views of the structured replies the phase handlers request.
//!
//! Each item is decoded on its own so one malformed element does not
//! discard its well-formed siblings.

use chronicle_types::{ActionId, ActorEffects, ActorId, Event, EventId, EventType, FieldMap};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

/// An event proposed by the provider.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeneratedEvent {
    /// Short headline.
    pub title: String,
    /// What happens.
    pub description: String,
    /// Category name; unknown names become `system`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Ids of affected actors.
    pub affected_actors: Vec<String>,
    /// Location object or bare location name.
    pub location: Option<Value>,
    /// `local`, `regional`, or `global`.
    pub scope: Option<String>,
    /// What caused the event.
    pub source: Option<String>,
    /// The action that caused it, if any.
    pub trigger_action_id: Option<String>,
    /// Event parameters.
    pub parameters: FieldMap,
    /// Free-form metadata.
    pub metadata: FieldMap,
}

impl GeneratedEvent {
    /// Build a pending [`Event`] with the given id.
    pub fn into_event(self, id: EventId) -> Event {
        let title = if self.title.trim().is_empty() {
            "Untitled event".to_owned()
        } else {
            self.title
        };
        let mut event = Event::new(id, title, self.event_type.parse().unwrap_or(EventType::System));
        event.description = self.description;
        event.affected_actors = self.affected_actors.into_iter().map(ActorId::from).collect();
        event.location = self.location.and_then(location_map);
        if let Some(scope) = self.scope.filter(|s| !s.trim().is_empty()) {
            event.scope = scope;
        }
        event.source = self
            .source
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "gateway".to_owned());
        event.trigger_action_id = self
            .trigger_action_id
            .filter(|id| !id.trim().is_empty() && id != "null")
            .map(ActionId::from);
        event.parameters = self.parameters;
        event.metadata = self.metadata;
        event
            .metadata
            .insert("generated_by".to_owned(), Value::from("gateway"));
        event
    }
}

/// Accept `{"name": ...}` objects and bare names.
fn location_map(value: Value) -> Option<FieldMap> {
    match value {
        Value::Object(map) => Some(map.into_iter().collect()),
        Value::String(name) if !name.trim().is_empty() => {
            Some(FieldMap::from([("name".to_owned(), Value::String(name))]))
        }
        _ => None,
    }
}

/// The provider's verdict on one pending action.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ActionOutcome {
    /// The action being resolved.
    pub action_id: String,
    /// `completed` or `failed`.
    pub status: String,
    /// Narrative of what happened.
    pub outcome_description: String,
    /// Changes to the acting actor.
    pub actor_effects: Option<ActorEffects>,
    /// Events caused by the action.
    pub generated_events: Vec<GeneratedEvent>,
}

impl ActionOutcome {
    /// Whether the provider reported failure.
    pub fn failed(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("failed")
    }
}

/// Changes to one actor proposed by a world update.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ActorUpdate {
    /// The actor to change.
    pub actor_id: String,
    /// The changes.
    #[serde(flatten)]
    pub effects: ActorEffects,
}

/// The provider's plan for applying event effects to the world.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldUpdatePlan {
    /// Per-actor changes.
    pub actor_updates: Vec<ActorUpdate>,
    /// Keys merged into the simulation's world state.
    pub world_state_changes: FieldMap,
}

impl WorldUpdatePlan {
    /// Decode a parsed reply object, dropping malformed actor updates.
    pub fn from_reply(mut reply: Map<String, Value>) -> Self {
        let actor_updates = match reply.remove("actor_updates") {
            Some(Value::Array(items)) => decode_each("actor update", items),
            _ => Vec::new(),
        };
        let world_state_changes = match reply.remove("world_state_changes") {
            Some(Value::Object(map)) => map.into_iter().collect(),
            _ => FieldMap::new(),
        };
        Self {
            actor_updates,
            world_state_changes,
        }
    }

    /// Whether the plan changes nothing.
    pub fn is_empty(&self) -> bool {
        self.actor_updates.is_empty() && self.world_state_changes.is_empty()
    }
}

/// Decode every item, logging and skipping those that do not fit `T`.
pub fn decode_each<T: DeserializeOwned>(kind: &str, items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(kind, error = %e, "dropping malformed reply item");
                None
            }
        })
        .collect()
}
