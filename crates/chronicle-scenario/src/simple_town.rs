//! The built-in `simple_town` scenario.
//!
//! Three town figures (mayor, doctor, caretaker), a morning briefing, and
//! the mayor's opening remarks. Ids are fixed, so re-seeding the same store
//! is idempotent.

use chrono::Utc;
use chronicle_types::{
    Action, ActionId, ActionPriority, ActionType, Actor, ActorId, ActorType, Event, EventId,
    EventType, FieldMap,
};
use serde_json::{Value, json};

use crate::context::ScenarioContext;
use crate::scenario::Scenario;

/// A small town with its leadership gathering for the day's briefing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTown;

/// Convert a `json!` object literal into a [`FieldMap`].
fn fields(value: Value) -> FieldMap {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => FieldMap::new(),
    }
}

/// Helper to build a located NPC with traits, skills, and a role.
fn townsperson(
    id: &str,
    name: &str,
    place: &str,
    traits: Value,
    skills: &[&str],
    metadata: Value,
) -> Actor {
    let mut actor = Actor::new(ActorId::from(id), name, ActorType::Npc);
    actor.attributes = fields(json!({ "traits": traits, "skills": skills }));
    actor.location = Some(fields(json!({ "name": place })));
    actor.metadata = fields(metadata);
    actor
}

impl Scenario for SimpleTown {
    fn key(&self) -> &'static str {
        "simple_town"
    }

    fn description(&self) -> &'static str {
        "A small town whose leadership meets each morning to coordinate"
    }

    fn seed(&self, context: &mut ScenarioContext) {
        let mayor = townsperson(
            "actor-mayor",
            "Mayor Alex Chen",
            "Town Hall",
            json!({ "leadership": "high", "openness": "moderate", "diplomacy": "high" }),
            &["public_speaking", "policy_making", "conflict_resolution"],
            json!({ "role": "mayor", "experience_years": 8 }),
        );
        let doctor = townsperson(
            "actor-doctor",
            "Dr. Sofia Rivera",
            "Community Clinic",
            json!({ "empathy": "high", "innovation": "moderate", "analytical": "high" }),
            &["diagnosis", "emergency_medicine", "patient_care"],
            json!({ "role": "doctor", "specialization": "general_practice" }),
        );
        let caretaker = townsperson(
            "actor-caretaker",
            "Sam Lee",
            "Community Center",
            json!({ "patience": "high", "organization": "high", "creativity": "moderate" }),
            &["event_planning", "resource_management", "community_outreach"],
            json!({ "role": "operations_manager" }),
        );

        let mut briefing = Event::new(
            EventId::from("event-briefing"),
            "Morning Town Briefing",
            EventType::System,
        );
        briefing.description = "Daily coordination meeting for town leadership to sync on \
                                priorities, incidents, and resource allocation."
            .to_owned();
        briefing.scheduled_for = Some(Utc::now());
        briefing.affected_actors = vec![mayor.id.clone(), doctor.id.clone(), caretaker.id.clone()];
        briefing.location = Some(fields(json!({ "name": "Town Hall" })));
        briefing.source = self.key().to_owned();
        briefing.metadata = fields(json!({ "recurring": "daily", "duration_minutes": 30 }));

        let mut opening = Action::new(
            ActionId::from("action-briefing-start"),
            mayor.id.clone(),
            context.simulation.id.clone(),
            ActionType::Communication,
            "Open the morning briefing with an overview of town priorities and agenda",
        );
        opening.description = "Mayor welcomes attendees and outlines the discussion topics \
                               for today's coordination meeting."
            .to_owned();
        opening.priority = ActionPriority::Normal;
        opening.parameters = fields(json!({
            "agenda": ["health_status_report", "resource_requests", "community_events"],
            "attendees": [doctor.id.as_str(), caretaker.id.as_str()],
        }));
        opening.metadata = fields(json!({ "related_event": briefing.id.as_str(), "phase": "opening" }));

        context.extend([mayor, doctor, caretaker], [briefing], [opening]);
    }
}
