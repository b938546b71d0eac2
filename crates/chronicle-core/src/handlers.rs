//! The six phase handlers.
//!
//! Each handler takes ownership of the simulation through its
//! [`PhaseContext`], persists the entities it touches, and hands the
//! simulation back inside a [`PhaseResult`]. Store failures propagate.
//! Gateway failures are logged at `warn`, noted on the result, and replaced
//! by the handler's no-gateway behaviour.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use chronicle_gateway::{ActionOutcome, Gateway, PromptContext};
use chronicle_scenario::{Scenario, ScenarioContext, ScenarioRegistry};
use chronicle_store::{Entity, EntityStore, StoreError};
use chronicle_types::{
    Action, ActionId, Actor, ActorEffects, Event, EventId, EventStatus, Phase, ScenarioMarker,
    Simulation, SimulationStatus, SnapshotRecord,
};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::CoordinatorError;
use crate::phase::{PhaseContext, PhaseResult};

/// Outcome recorded for actions resolved without the gateway.
pub const GENERIC_OUTCOME: &str = "Completed without narrative resolution.";

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Fetch every listed entity, skipping ids that no longer resolve.
async fn load_all<T, I>(store: &EntityStore, ids: &[I]) -> Result<Vec<T>, StoreError>
where
    T: Entity,
    I: AsRef<str>,
{
    let repo = store.repo::<T>();
    let mut found = Vec::with_capacity(ids.len());
    for id in ids {
        match repo.get(id.as_ref()).await? {
            Some(entity) => found.push(entity),
            None => debug!(kind = %T::KIND, id = id.as_ref(), "referenced entity missing"),
        }
    }
    Ok(found)
}

/// Apply `effects` to the stored actor `actor_id`. Returns `false` when the
/// actor does not exist or nothing changed.
async fn apply_actor_effects(
    store: &EntityStore,
    actor_id: &str,
    effects: &ActorEffects,
) -> Result<bool, StoreError> {
    if effects.is_empty() {
        return Ok(false);
    }
    let Some(mut actor) = store.actors().get(actor_id).await? else {
        debug!(actor_id, "effects target unknown actor, skipping");
        return Ok(false);
    };
    if !actor.apply_effects(effects) {
        return Ok(false);
    }
    store.actors().save(&actor).await
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// The scenario that seeded `simulation`, or the one its key selects.
fn scenario_for(
    scenarios: &ScenarioRegistry,
    simulation: &Simulation,
) -> Option<Arc<dyn Scenario>> {
    if let Some(seeded) = simulation
        .metadata
        .scenario
        .as_ref()
        .and_then(|marker| scenarios.get(&marker.scenario_key))
    {
        return Some(seeded);
    }
    match scenarios.select(&simulation.scenario_key) {
        Ok(scenario) => Some(scenario),
        Err(e) => {
            warn!(
                simulation_id = %simulation.id,
                scenario = %simulation.scenario_key,
                error = %e,
                "no scenario available"
            );
            None
        }
    }
}

/// Positions in a [`ScenarioContext`]'s lists before which entities have
/// already been persisted.
#[derive(Debug, Clone, Copy, Default)]
struct Marks {
    actors: usize,
    events: usize,
    actions: usize,
}

impl Marks {
    fn of(context: &ScenarioContext) -> Self {
        Self {
            actors: context.actors.len(),
            events: context.events.len(),
            actions: context.actions.len(),
        }
    }
}

/// Entities newly written by [`persist_scenario_entities`].
#[derive(Debug, Default)]
struct Persisted {
    actors: usize,
    event_ids: Vec<EventId>,
    action_ids: Vec<ActionId>,
}

impl Persisted {
    fn absorb(&mut self, other: Self) {
        self.actors = self.actors.saturating_add(other.actors);
        self.event_ids.extend(other.event_ids);
        self.action_ids.extend(other.action_ids);
    }

    fn total(&self) -> usize {
        self.actors
            .saturating_add(self.event_ids.len())
            .saturating_add(self.action_ids.len())
    }
}

/// Store every entity past `marks` that is not already present and register
/// it on the context's simulation.
async fn persist_scenario_entities(
    store: &EntityStore,
    context: &mut ScenarioContext,
    marks: Marks,
) -> Result<Persisted, StoreError> {
    let mut persisted = Persisted::default();

    for actor in context.actors.iter().skip(marks.actors) {
        if !store.actors().exists(actor.id.as_str()).await? {
            store.actors().create(actor).await?;
            persisted.actors = persisted.actors.saturating_add(1);
        }
        if actor.active {
            context.simulation.add_actor(actor.id.clone());
        }
    }

    for event in context.events.iter().skip(marks.events) {
        if !store.events().exists(event.id.as_str()).await? {
            store.events().create(event).await?;
            persisted.event_ids.push(event.id.clone());
        }
        if event.status == EventStatus::Pending {
            context.simulation.add_pending_event(event.id.clone());
        }
    }

    for action in context.actions.iter().skip(marks.actions) {
        if !store.actions().exists(action.id.as_str()).await? {
            store.actions().create(action).await?;
            persisted.action_ids.push(action.id.clone());
        }
        if !action.status.is_settled() {
            context.simulation.add_pending_action(action.id.clone());
        }
    }

    Ok(persisted)
}

// ---------------------------------------------------------------------------
// initialize
// ---------------------------------------------------------------------------

/// Start a created simulation or resume a paused one.
pub fn initialize(ctx: PhaseContext<'_>) -> PhaseResult {
    let mut simulation = ctx.simulation;
    let note = match simulation.status {
        SimulationStatus::Created => {
            simulation.start();
            info!(simulation_id = %simulation.id, "simulation started");
            "Simulation started."
        }
        SimulationStatus::Paused => {
            simulation.resume();
            info!(simulation_id = %simulation.id, "simulation resumed by initialize");
            "Simulation resumed."
        }
        _ => "Simulation already running.",
    };
    let mut result = PhaseResult::new(simulation, Phase::Initialize);
    result.note(note);
    result
}

// ---------------------------------------------------------------------------
// event_generation
// ---------------------------------------------------------------------------

/// Build the working set for an event-generation run: a freshly seeded
/// context on the first run, the simulation's live entities afterwards.
async fn working_set(
    store: &EntityStore,
    simulation: Simulation,
    scenario: Option<&Arc<dyn Scenario>>,
    notes: &mut Vec<String>,
) -> Result<(ScenarioContext, Marks), StoreError> {
    if simulation.metadata.is_seeded() {
        let actors: Vec<Actor> = load_all(store, &simulation.active_actor_ids).await?;
        let events: Vec<Event> = load_all(store, &simulation.pending_event_ids).await?;
        let actions: Vec<Action> = load_all(store, &simulation.pending_action_ids).await?;
        let mut context = ScenarioContext::new(simulation);
        context.extend(actors, events, actions);
        let marks = Marks::of(&context);
        return Ok((context, marks));
    }
    let mut context = ScenarioContext::new(simulation);
    if let Some(scenario) = scenario {
        scenario.seed(&mut context);
        notes.push(format!("Seeded scenario '{}'.", scenario.key()));
    } else {
        notes.push("No scenario registered; skipped seeding.".to_owned());
    }
    Ok((context, Marks::default()))
}

/// Ask the gateway for new events and persist them as pending.
async fn generate_events(
    store: &EntityStore,
    gateway: &Gateway,
    context: &mut ScenarioContext,
    notes: &mut Vec<String>,
) -> Result<Vec<EventId>, StoreError> {
    let prompt = PromptContext::build(
        &context.simulation,
        &context.actors,
        &context.events,
        &context.actions,
    );
    let proposals = match gateway.generate_events(&prompt).await {
        Ok(proposals) => proposals,
        Err(e) => {
            warn!(
                simulation_id = %context.simulation.id,
                error = %e,
                "event generation failed, continuing without new events"
            );
            notes.push(format!("Event generation unavailable: {e}"));
            return Ok(Vec::new());
        }
    };
    let mut event_ids = Vec::with_capacity(proposals.len());
    for proposal in proposals {
        let event = proposal.into_event(EventId::generate());
        store.events().create(&event).await?;
        context.simulation.add_pending_event(event.id.clone());
        event_ids.push(event.id);
    }
    notes.push(format!("Generated {} events.", event_ids.len()));
    Ok(event_ids)
}

/// Seed the scenario on the first run; afterwards run the scenario hooks and
/// ask the gateway for new events.
pub async fn event_generation(ctx: PhaseContext<'_>) -> Result<PhaseResult, CoordinatorError> {
    let PhaseContext {
        simulation,
        store,
        gateway,
        scenarios,
        ..
    } = ctx;
    let seeded = simulation.metadata.is_seeded();
    let scenario = scenario_for(scenarios, &simulation);
    let mut notes = Vec::new();

    let (mut context, marks) = working_set(store, simulation, scenario.as_ref(), &mut notes).await?;
    if let Some(scenario) = &scenario {
        scenario.before_phase(&mut context);
    }
    let mut persisted = persist_scenario_entities(store, &mut context, marks).await?;
    if let Some(scenario) = &scenario {
        let marks = Marks::of(&context);
        scenario.after_phase(&mut context);
        persisted.absorb(persist_scenario_entities(store, &mut context, marks).await?);
    }
    if persisted.total() > 0 {
        notes.push(format!(
            "Persisted {} actors, {} events, {} actions from scenario.",
            persisted.actors,
            persisted.event_ids.len(),
            persisted.action_ids.len()
        ));
    }

    let mut generated = Vec::new();
    if let Some(gateway) = gateway.filter(|_| seeded) {
        generated = generate_events(store, gateway, &mut context, &mut notes).await?;
    }

    let mut simulation = context.simulation;
    let now = Utc::now();
    if !seeded {
        let scenario_key = scenario
            .as_ref()
            .map_or_else(|| simulation.scenario_key.clone(), |s| s.key().to_owned());
        simulation.metadata.scenario = Some(ScenarioMarker {
            seeded: true,
            scenario_key,
            seeded_at: Some(now),
        });
    }
    simulation.metadata.last_event_generation_at = Some(now);
    notes.push(format!(
        "{} events pending after generation.",
        simulation.pending_event_ids.len()
    ));
    simulation.update_phase_statistics(
        Phase::EventGeneration,
        json!({
            "seeded": !seeded,
            "persisted_entities": persisted.total(),
            "generated_events": generated.len(),
        }),
    );

    let mut result = PhaseResult::new(simulation, Phase::EventGeneration);
    result.generated_event_ids = persisted.event_ids;
    result.generated_event_ids.extend(generated);
    result.generated_action_ids = persisted.action_ids;
    result.notes = notes;
    Ok(result)
}

// ---------------------------------------------------------------------------
// action_collection
// ---------------------------------------------------------------------------

/// Drop pending-action ids whose action is settled or missing.
pub async fn action_collection(ctx: PhaseContext<'_>) -> Result<PhaseResult, CoordinatorError> {
    let PhaseContext {
        mut simulation,
        store,
        ..
    } = ctx;
    let repo = store.actions();
    let mut retained = Vec::with_capacity(simulation.pending_action_ids.len());
    let mut dropped = 0_usize;
    for id in &simulation.pending_action_ids {
        match repo.get(id.as_str()).await? {
            Some(action) if !action.status.is_settled() => retained.push(id.clone()),
            _ => dropped = dropped.saturating_add(1),
        }
    }
    simulation.pending_action_ids = retained;

    let tracked = simulation.pending_action_ids.len();
    simulation.update_phase_statistics(
        Phase::ActionCollection,
        json!({ "tracked": tracked, "dropped": dropped }),
    );

    let mut result = PhaseResult::new(simulation, Phase::ActionCollection);
    result.note(format!("Tracked {tracked} pending actions for resolution."));
    if dropped > 0 {
        result.note(format!("Dropped {dropped} settled or missing actions."));
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// action_resolution
// ---------------------------------------------------------------------------

/// How one action was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Completed,
    Failed,
    Generic,
}

/// Ask the gateway for per-action outcomes, keyed by action id. A gateway
/// failure yields no outcomes.
async fn request_outcomes(
    store: &EntityStore,
    gateway: &Gateway,
    simulation: &Simulation,
    actions: &[Action],
    notes: &mut Vec<String>,
) -> Result<HashMap<String, ActionOutcome>, StoreError> {
    let actors: Vec<Actor> = load_all(store, &simulation.active_actor_ids).await?;
    let prompt = PromptContext::build(simulation, &actors, &[], actions);
    match gateway.resolve_actions(&prompt).await {
        Ok(list) => Ok(list
            .into_iter()
            .map(|outcome| (outcome.action_id.clone(), outcome))
            .collect()),
        Err(e) => {
            warn!(
                simulation_id = %simulation.id,
                error = %e,
                "action resolution failed, completing actions generically"
            );
            notes.push(format!("Action resolution unavailable: {e}"));
            Ok(HashMap::new())
        }
    }
}

/// Apply one provider outcome: settle the action, change its actor, and
/// queue any consequent events.
async fn apply_outcome(
    store: &EntityStore,
    simulation: &mut Simulation,
    action: &mut Action,
    outcome: ActionOutcome,
    event_ids: &mut Vec<EventId>,
) -> Result<Settlement, StoreError> {
    let failed = outcome.failed();
    let ActionOutcome {
        outcome_description,
        actor_effects,
        generated_events,
        ..
    } = outcome;
    let description = if outcome_description.trim().is_empty() {
        GENERIC_OUTCOME.to_owned()
    } else {
        outcome_description
    };
    let settlement = if failed {
        action.fail(description);
        Settlement::Failed
    } else {
        action.complete(description);
        Settlement::Completed
    };
    if let Some(effects) = &actor_effects {
        apply_actor_effects(store, action.actor_id.as_str(), effects).await?;
    }
    for proposal in generated_events {
        let mut event = proposal.into_event(EventId::generate());
        if event.trigger_action_id.is_none() {
            event.trigger_action_id = Some(action.id.clone());
        }
        store.events().create(&event).await?;
        simulation.add_pending_event(event.id.clone());
        event_ids.push(event.id);
    }
    Ok(settlement)
}

/// Settle every pending action, through the gateway when one is configured.
pub async fn action_resolution(ctx: PhaseContext<'_>) -> Result<PhaseResult, CoordinatorError> {
    let PhaseContext {
        mut simulation,
        store,
        gateway,
        ..
    } = ctx;
    let mut actions: Vec<Action> = load_all(store, &simulation.pending_action_ids).await?;
    actions.retain(|action| !action.status.is_settled());

    if actions.is_empty() {
        let mut result = PhaseResult::new(simulation, Phase::ActionResolution);
        result.note("No actions queued for resolution.");
        return Ok(result);
    }

    let mut notes = Vec::new();
    let mut outcomes = match gateway {
        Some(gateway) => request_outcomes(store, gateway, &simulation, &actions, &mut notes).await?,
        None => HashMap::new(),
    };

    let (mut completed, mut failed, mut generic) = (0_usize, 0_usize, 0_usize);
    let mut event_ids = Vec::new();
    for mut action in actions {
        let settlement = match outcomes.remove(action.id.as_str()) {
            Some(outcome) => {
                apply_outcome(store, &mut simulation, &mut action, outcome, &mut event_ids).await?
            }
            None => {
                action.complete(GENERIC_OUTCOME);
                Settlement::Generic
            }
        };
        let counter = match settlement {
            Settlement::Completed => &mut completed,
            Settlement::Failed => &mut failed,
            Settlement::Generic => &mut generic,
        };
        *counter = counter.saturating_add(1);
        store.actions().save(&action).await?;
        simulation.remove_pending_action(&action.id);
    }

    simulation.update_phase_statistics(
        Phase::ActionResolution,
        json!({
            "completed": completed,
            "failed": failed,
            "generic": generic,
            "generated_events": event_ids.len(),
        }),
    );
    notes.push(format!(
        "Resolved {} actions ({completed} completed, {failed} failed, {generic} generic).",
        completed.saturating_add(failed).saturating_add(generic)
    ));

    let mut result = PhaseResult::new(simulation, Phase::ActionResolution);
    result.generated_event_ids = event_ids;
    result.notes = notes;
    Ok(result)
}

// ---------------------------------------------------------------------------
// world_update
// ---------------------------------------------------------------------------

/// Apply pending event effects, resolve the events, and clear the queue.
pub async fn world_update(ctx: PhaseContext<'_>) -> Result<PhaseResult, CoordinatorError> {
    let PhaseContext {
        mut simulation,
        store,
        gateway,
        ..
    } = ctx;
    let mut events: Vec<Event> = load_all(store, &simulation.pending_event_ids).await?;
    let mut notes = Vec::new();
    let mut applied = 0_usize;

    for event in &events {
        for (actor_id, effects) in &event.effects {
            if apply_actor_effects(store, actor_id, effects).await? {
                applied = applied.saturating_add(1);
            }
        }
    }

    if let Some(gateway) = gateway.filter(|_| !events.is_empty()) {
        let actors: Vec<Actor> = load_all(store, &simulation.active_actor_ids).await?;
        let prompt = PromptContext::build(&simulation, &actors, &events, &[]);
        match gateway.plan_world_update(&prompt).await {
            Ok(plan) => {
                for update in &plan.actor_updates {
                    if apply_actor_effects(store, &update.actor_id, &update.effects).await? {
                        applied = applied.saturating_add(1);
                    }
                }
                if !plan.world_state_changes.is_empty() {
                    notes.push(format!(
                        "Updated {} world state keys.",
                        plan.world_state_changes.len()
                    ));
                    simulation.update_world_state(plan.world_state_changes);
                }
            }
            Err(e) => {
                warn!(
                    simulation_id = %simulation.id,
                    error = %e,
                    "world update planning failed, applying stored effects only"
                );
                notes.push(format!("World update planning unavailable: {e}"));
            }
        }
    }

    let mut resolved = 0_usize;
    for event in &mut events {
        if event.status == EventStatus::Cancelled {
            continue;
        }
        event.resolve();
        store.events().save(event).await?;
        resolved = resolved.saturating_add(1);
    }
    simulation.pending_event_ids.clear();

    simulation.update_phase_statistics(
        Phase::WorldUpdate,
        json!({ "resolved_events": resolved, "actor_updates": applied }),
    );
    notes.push(format!(
        "Resolved {resolved} events and applied {applied} actor updates."
    ));

    let mut result = PhaseResult::new(simulation, Phase::WorldUpdate);
    result.notes = notes;
    Ok(result)
}

// ---------------------------------------------------------------------------
// snapshot
// ---------------------------------------------------------------------------

/// Record a point-in-time summary and run the scenario's snapshot hook.
pub async fn snapshot(ctx: PhaseContext<'_>) -> Result<PhaseResult, CoordinatorError> {
    let PhaseContext {
        mut simulation,
        store,
        scenarios,
        snapshot_history_limit,
        ..
    } = ctx;

    let actor_count = simulation.active_actor_ids.len();
    let pending_events = simulation.pending_event_ids.len();
    let pending_actions = simulation.pending_action_ids.len();
    let summary = format!(
        "Cycle {}: {actor_count} actors, {pending_events} pending events, {pending_actions} pending actions.",
        simulation.cycle_number
    );
    let record = SnapshotRecord {
        cycle_number: simulation.cycle_number,
        taken_at: Utc::now(),
        actor_count: count(actor_count),
        pending_event_count: count(pending_events),
        pending_action_count: count(pending_actions),
        summary: summary.clone(),
    };
    simulation.record_snapshot(record, snapshot_history_limit);

    let mut persisted = Persisted::default();
    if let Some(scenario) = scenario_for(scenarios, &simulation) {
        let mut context = ScenarioContext::new(simulation);
        scenario.on_snapshot(&mut context);
        persisted = persist_scenario_entities(store, &mut context, Marks::default()).await?;
        simulation = context.simulation;
    }

    let mut result = PhaseResult::new(simulation, Phase::Snapshot);
    result.note(summary);
    result.generated_event_ids = persisted.event_ids;
    result.generated_action_ids = persisted.action_ids;
    Ok(result)
}
