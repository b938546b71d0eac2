//! Prompt construction via `minijinja`.
//!
//! Templates live in `templates/` and are compiled into the binary. The
//! engine renders a [`PromptContext`] (a summary of the simulation's current
//! state) into the system and user messages for one [`PromptTask`].

use chronicle_types::{Action, Actor, Event, Simulation};
use minijinja::Environment;
use serde::Serialize;
use serde_json::Value;

use crate::error::GatewayError;
use crate::message::GatewayMessage;

/// The structured request a phase handler makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTask {
    /// Propose 1-3 new events (JSON array).
    EventGeneration,
    /// Decide each pending action's outcome (JSON array).
    ActionResolution,
    /// Turn recent events into actor and world changes (JSON object).
    WorldUpdate,
}

impl PromptTask {
    const fn template(self) -> &'static str {
        match self {
            Self::EventGeneration => "event_generation.j2",
            Self::ActionResolution => "action_resolution.j2",
            Self::WorldUpdate => "world_update.j2",
        }
    }
}

/// The complete rendered prompt ready to send to a provider.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    /// System message fixing the reply format.
    pub system: String,
    /// User message with the simulation context and the task.
    pub user: String,
}

impl RenderedPrompt {
    /// The prompt as a message list.
    pub fn messages(&self) -> Vec<GatewayMessage> {
        vec![
            GatewayMessage::system(self.system.clone()),
            GatewayMessage::user(self.user.clone()),
        ]
    }
}

/// Simulation summary shown at the top of every prompt.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationView {
    /// Display name.
    pub name: String,
    /// Scenario key.
    pub scenario: String,
    /// Completed cycles.
    pub cycle: u64,
    /// Status name.
    pub status: String,
}

/// One actor as the provider sees it.
#[derive(Debug, Clone, Serialize)]
pub struct ActorView {
    /// Actor id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Actor type name.
    pub actor_type: String,
    /// Location name or `Unknown`.
    pub location: String,
    /// `key: value` pairs from `attributes.traits`.
    pub traits: Option<String>,
    /// Names from `attributes.skills`.
    pub skills: Option<String>,
    /// `metadata.role`, else `attributes.role`.
    pub role: Option<String>,
}

/// One recent event as the provider sees it.
#[derive(Debug, Clone, Serialize)]
pub struct EventView {
    /// Event id.
    pub id: String,
    /// Headline.
    pub title: String,
    /// Narrative.
    pub description: String,
    /// Event type name.
    pub event_type: String,
    /// Status name.
    pub status: String,
}

/// One pending action as the provider sees it.
#[derive(Debug, Clone, Serialize)]
pub struct ActionView {
    /// Action id.
    pub id: String,
    /// Acting actor's name, or its id when the actor is unknown.
    pub actor_name: String,
    /// What the actor wants to do.
    pub intent: String,
    /// Action type name.
    pub action_type: String,
    /// Priority name.
    pub priority: String,
    /// Status name.
    pub status: String,
}

/// Everything a prompt template can reference.
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    /// Simulation summary.
    pub simulation: SimulationView,
    /// Active actors.
    pub actors: Vec<ActorView>,
    /// Pending or recent events.
    pub events: Vec<EventView>,
    /// Pending actions.
    pub actions: Vec<ActionView>,
}

impl PromptContext {
    /// Summarise the simulation and the entities it references.
    pub fn build(
        simulation: &Simulation,
        actors: &[Actor],
        events: &[Event],
        actions: &[Action],
    ) -> Self {
        Self {
            simulation: SimulationView {
                name: simulation.name.clone(),
                scenario: simulation.scenario_key.clone(),
                cycle: simulation.cycle_number,
                status: simulation.status.to_string(),
            },
            actors: actors.iter().map(actor_view).collect(),
            events: events
                .iter()
                .map(|e| EventView {
                    id: e.id.to_string(),
                    title: e.title.clone(),
                    description: e.description.clone(),
                    event_type: e.event_type.to_string(),
                    status: e.status.to_string(),
                })
                .collect(),
            actions: actions
                .iter()
                .map(|a| ActionView {
                    id: a.id.to_string(),
                    actor_name: actors
                        .iter()
                        .find(|actor| actor.id == a.actor_id)
                        .map_or_else(|| a.actor_id.to_string(), |actor| actor.name.clone()),
                    intent: a.intent.clone(),
                    action_type: a.action_type.to_string(),
                    priority: a.priority.to_string(),
                    status: a.status.to_string(),
                })
                .collect(),
        }
    }
}

fn display_value(value: &Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), ToOwned::to_owned)
}

fn actor_view(actor: &Actor) -> ActorView {
    let traits = actor
        .attributes
        .get("traits")
        .and_then(Value::as_object)
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.iter()
                .map(|(k, v)| format!("{k}: {}", display_value(v)))
                .collect::<Vec<_>>()
                .join(", ")
        });
    let skills = actor
        .attributes
        .get("skills")
        .and_then(Value::as_array)
        .filter(|s| !s.is_empty())
        .map(|s| s.iter().map(display_value).collect::<Vec<_>>().join(", "));
    let role = actor
        .metadata
        .get("role")
        .or_else(|| actor.attributes.get("role"))
        .map(display_value);

    ActorView {
        id: actor.id.to_string(),
        name: actor.name.clone(),
        actor_type: actor.actor_type.to_string(),
        location: actor.location_name().unwrap_or("Unknown").to_owned(),
        traits,
        skills,
        role,
    }
}

/// Manages prompt template loading and rendering.
///
/// Wraps a `minijinja` [`Environment`] with every prompt template
/// pre-loaded.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// Create a prompt engine with the built-in templates.
    pub fn new() -> Result<Self, GatewayError> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);

        let templates = [
            ("system.j2", include_str!("../templates/system.j2")),
            ("context.j2", include_str!("../templates/context.j2")),
            (
                "event_generation.j2",
                include_str!("../templates/event_generation.j2"),
            ),
            (
                "action_resolution.j2",
                include_str!("../templates/action_resolution.j2"),
            ),
            ("world_update.j2", include_str!("../templates/world_update.j2")),
        ];
        for (name, source) in templates {
            env.add_template(name, source).map_err(|e| {
                GatewayError::Template(format!("failed to add {name} template: {e}"))
            })?;
        }

        Ok(Self { env })
    }

    /// Render the prompt for `task` over `context`.
    pub fn render(
        &self,
        task: PromptTask,
        context: &PromptContext,
    ) -> Result<RenderedPrompt, GatewayError> {
        let system = self.render_template("system.j2", context)?;
        let user = self.render_template(task.template(), context)?;
        Ok(RenderedPrompt {
            system: system.trim().to_owned(),
            user: user.trim().to_owned(),
        })
    }

    /// Render the simulation context summary on its own.
    pub fn render_context(&self, context: &PromptContext) -> Result<String, GatewayError> {
        self.render_template("context.j2", context)
    }

    fn render_template(&self, name: &str, context: &PromptContext) -> Result<String, GatewayError> {
        self.env
            .get_template(name)
            .map_err(|e| GatewayError::Template(format!("missing {name} template: {e}")))?
            .render(context)
            .map_err(|e| GatewayError::Template(format!("{name} render failed: {e}")))
    }
}
