//! The mutable working set a scenario seeds and its hooks observe.

use chronicle_types::{Action, Actor, Event, Simulation};

/// Carries a simulation snapshot plus the entities a scenario produced or
/// the coordinator loaded for it.
#[derive(Debug, Clone)]
pub struct ScenarioContext {
    /// The simulation being seeded or advanced.
    pub simulation: Simulation,
    /// Actors in play.
    pub actors: Vec<Actor>,
    /// Events in play.
    pub events: Vec<Event>,
    /// Actions in play.
    pub actions: Vec<Action>,
}

impl ScenarioContext {
    /// An empty context for `simulation`.
    pub const fn new(simulation: Simulation) -> Self {
        Self {
            simulation,
            actors: Vec::new(),
            events: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Append entities, preserving order.
    pub fn extend(
        &mut self,
        actors: impl IntoIterator<Item = Actor>,
        events: impl IntoIterator<Item = Event>,
        actions: impl IntoIterator<Item = Action>,
    ) {
        self.actors.extend(actors);
        self.events.extend(events);
        self.actions.extend(actions);
    }

    /// Whether no entities are present.
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty() && self.events.is_empty() && self.actions.is_empty()
    }
}
