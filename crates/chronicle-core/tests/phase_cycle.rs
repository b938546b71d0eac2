//! Phase coordinator behaviour against the local JSON store.
//!
//! Each test writes to its own directory under the system temp dir; no
//! external services or network are needed.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chronicle_core::handlers::GENERIC_OUTCOME;
use chronicle_core::{
    ChronicleConfig, CoordinatorError, NewSimulation, PhaseResult, Runtime,
};
use chronicle_scenario::{Scenario, ScenarioContext, ScenarioRegistry};
use chronicle_store::{BackendConfig, EntityStore};
use chronicle_types::{
    Action, ActionId, ActionStatus, ActionType, Actor, ActorEffects, ActorId, ActorType, Event,
    EventId, EventStatus, EventType, Phase, SimulationId, SimulationStatus,
};
use serde_json::Value;

fn temp_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "chronicle_core_cycle_{name}_{}",
        std::process::id()
    ));
    std::fs::remove_dir_all(&dir).ok();
    dir.join("state.json")
}

async fn runtime_at(path: PathBuf, config: ChronicleConfig) -> Runtime {
    let store = EntityStore::open(&BackendConfig::Local { path })
        .await
        .expect("open local store");
    Runtime::from_parts(config, store, None, ScenarioRegistry::with_builtins())
}

async fn runtime(name: &str) -> Runtime {
    runtime_at(temp_path(name), ChronicleConfig::default()).await
}

fn new_sim(name: &str, max_cycles: u64) -> NewSimulation {
    NewSimulation {
        name: name.to_owned(),
        max_cycles: Some(max_cycles),
        ..NewSimulation::default()
    }
}

fn phases(results: &[PhaseResult]) -> Vec<Phase> {
    results.iter().map(|r| r.executed_phase).collect()
}

// ---------------------------------------------------------------------------
// Lifecycle scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn created_simulation_starts_at_initialize() {
    let rt = runtime("created").await;
    let sim = rt.create_simulation(new_sim("Town", 20)).await.unwrap();

    assert_eq!(sim.status, SimulationStatus::Created);
    assert_eq!(sim.current_phase, Phase::Initialize);
    assert_eq!(sim.cycle_number, 0);
    assert_eq!(sim.scenario_key, "simple_town");
    assert!(sim.id.as_str().starts_with("sim-"));

    let loaded = rt.get_simulation(&sim.id).await.unwrap();
    assert_eq!(loaded.id, sim.id);
    assert_eq!(loaded.status, SimulationStatus::Created);
}

#[tokio::test]
async fn first_step_starts_the_simulation() {
    let rt = runtime("first_step").await;
    let sim = rt.create_simulation(new_sim("Town", 20)).await.unwrap();

    let result = rt.step(&sim.id, None).await.unwrap();
    assert_eq!(result.executed_phase, Phase::Initialize);
    assert_eq!(result.next_phase, Phase::EventGeneration);

    let loaded = rt.get_simulation(&sim.id).await.unwrap();
    assert_eq!(loaded.status, SimulationStatus::Running);
    assert_eq!(loaded.current_phase, Phase::EventGeneration);
    assert!(loaded.started_at.is_some());
}

#[tokio::test]
async fn six_steps_complete_one_cycle() {
    let rt = runtime("six_steps").await;
    let sim = rt.create_simulation(new_sim("Town", 20)).await.unwrap();

    let mut executed = Vec::new();
    for call in 1..=6 {
        let result = rt.step(&sim.id, None).await.unwrap();
        executed.push(result.executed_phase);
        let expected_cycle = if call < 6 { 0 } else { 1 };
        assert_eq!(result.simulation.cycle_number, expected_cycle, "after call {call}");
    }

    assert_eq!(executed, Phase::CANONICAL);
    let loaded = rt.get_simulation(&sim.id).await.unwrap();
    assert_eq!(loaded.cycle_number, 1);
    assert_eq!(loaded.current_phase, Phase::EventGeneration);
    assert_eq!(loaded.snapshot_count, 1);
}

#[tokio::test]
async fn reaching_max_cycles_completes_and_blocks_further_steps() {
    let rt = runtime("max_cycles").await;
    let sim = rt.create_simulation(new_sim("Short", 1)).await.unwrap();

    let results = rt.run_cycle(&sim.id).await.unwrap();
    let last = results.last().unwrap();
    assert_eq!(last.executed_phase, Phase::Snapshot);
    assert_eq!(last.next_phase, Phase::Completed);

    let done = rt.get_simulation(&sim.id).await.unwrap();
    assert_eq!(done.status, SimulationStatus::Completed);
    assert_eq!(done.current_phase, Phase::Completed);
    assert!(done.completed_at.is_some());

    let err = rt.step(&sim.id, None).await.unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::TerminalState {
            status: SimulationStatus::Completed,
            ..
        }
    ));
    let after = rt.get_simulation(&sim.id).await.unwrap();
    assert_eq!(after.current_phase, Phase::Completed);
    assert_eq!(after.updated_at, done.updated_at);
}

#[tokio::test]
async fn cycle_number_increases_once_per_snapshot() {
    let rt = runtime("monotonic").await;
    let sim = rt.create_simulation(new_sim("Long", 10)).await.unwrap();

    let mut last_cycle = 0;
    for _ in 0..20 {
        let result = rt.step(&sim.id, None).await.unwrap();
        let cycle = result.simulation.cycle_number;
        assert!(cycle >= last_cycle);
        if result.executed_phase == Phase::Snapshot {
            assert_eq!(cycle, last_cycle + 1);
        } else {
            assert_eq!(cycle, last_cycle);
        }
        last_cycle = cycle;
    }
    assert_eq!(last_cycle, 3);
}

// ---------------------------------------------------------------------------
// run_cycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_cycle_stops_after_snapshot() {
    let rt = runtime("run_cycle").await;
    let sim = rt.create_simulation(new_sim("Town", 5)).await.unwrap();

    let first = rt.run_cycle(&sim.id).await.unwrap();
    assert_eq!(phases(&first), Phase::CANONICAL);

    let second = rt.run_cycle(&sim.id).await.unwrap();
    assert_eq!(
        phases(&second),
        [
            Phase::EventGeneration,
            Phase::ActionCollection,
            Phase::ActionResolution,
            Phase::WorldUpdate,
            Phase::Snapshot,
        ]
    );
    assert_eq!(rt.get_simulation(&sim.id).await.unwrap().cycle_number, 2);
}

#[tokio::test]
async fn run_cycle_on_paused_or_completed_simulation_does_nothing() {
    let rt = runtime("run_cycle_stop").await;
    let paused = rt.create_simulation(new_sim("Paused", 5)).await.unwrap();
    rt.pause(&paused.id).await.unwrap();
    assert!(rt.run_cycle(&paused.id).await.unwrap().is_empty());

    let done = rt.create_simulation(new_sim("Done", 1)).await.unwrap();
    rt.run_cycle(&done.id).await.unwrap();
    assert!(rt.run_cycle(&done.id).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Phase sequencing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn forcing_an_out_of_order_phase_is_rejected() {
    let rt = runtime("unexpected").await;
    let sim = rt.create_simulation(new_sim("Town", 5)).await.unwrap();

    let err = rt
        .step(&sim.id, Some(Phase::ActionResolution))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::UnexpectedPhase {
            expected: Phase::Initialize,
            requested: Phase::ActionResolution,
            ..
        }
    ));
    let unchanged = rt.get_simulation(&sim.id).await.unwrap();
    assert_eq!(unchanged.current_phase, Phase::Initialize);

    let ok = rt.step(&sim.id, Some(Phase::Initialize)).await.unwrap();
    assert_eq!(ok.executed_phase, Phase::Initialize);
}

#[tokio::test]
async fn forced_phase_runs_when_enforcement_is_off() {
    let mut config = ChronicleConfig::default();
    config.coordinator.enforce_phase_sequence = false;
    let rt = runtime_at(temp_path("unenforced"), config).await;
    let sim = rt.create_simulation(new_sim("Town", 5)).await.unwrap();
    rt.step(&sim.id, None).await.unwrap();

    let result = rt.step(&sim.id, Some(Phase::Snapshot)).await.unwrap();
    assert_eq!(result.executed_phase, Phase::Snapshot);
    assert_eq!(result.simulation.cycle_number, 1);
    assert_eq!(result.simulation.current_phase, Phase::EventGeneration);

    let err = rt.step(&sim.id, Some(Phase::Paused)).await.unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::MissingHandler {
            phase: Phase::Paused
        }
    ));
}

#[tokio::test]
async fn stepping_an_unknown_simulation_is_not_found() {
    let rt = runtime("not_found").await;
    let err = rt
        .step(&SimulationId::from("sim-missing"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotFound { kind: "simulation", .. }));
}

// ---------------------------------------------------------------------------
// Pause and resume
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resume_continues_from_the_paused_phase() {
    let rt = runtime("resume").await;
    let sim = rt.create_simulation(new_sim("Town", 5)).await.unwrap();
    rt.step(&sim.id, None).await.unwrap();
    rt.step(&sim.id, None).await.unwrap();

    let paused = rt.pause(&sim.id).await.unwrap();
    assert_eq!(paused.status, SimulationStatus::Paused);
    assert_eq!(paused.current_phase, Phase::Paused);
    assert_eq!(paused.metadata.paused_from, Some(Phase::ActionCollection));

    let blocked = rt.step(&sim.id, None).await.unwrap_err();
    assert!(matches!(blocked, CoordinatorError::UnexpectedPhase { .. }));

    let again = rt.pause(&sim.id).await.unwrap();
    assert_eq!(again.metadata.paused_from, Some(Phase::ActionCollection));

    let resumed = rt.resume(&sim.id).await.unwrap();
    assert_eq!(resumed.status, SimulationStatus::Running);
    assert_eq!(resumed.current_phase, Phase::ActionCollection);
    assert_eq!(resumed.metadata.paused_from, None);

    let next = rt.step(&sim.id, None).await.unwrap();
    assert_eq!(next.executed_phase, Phase::ActionCollection);
}

#[tokio::test]
async fn resume_of_running_simulation_changes_nothing() {
    let rt = runtime("resume_noop").await;
    let sim = rt.create_simulation(new_sim("Town", 5)).await.unwrap();
    rt.step(&sim.id, None).await.unwrap();

    let before = rt.get_simulation(&sim.id).await.unwrap();
    let after = rt.resume(&sim.id).await.unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn pausing_a_completed_simulation_is_rejected() {
    let rt = runtime("pause_done").await;
    let sim = rt.create_simulation(new_sim("Done", 1)).await.unwrap();
    rt.run_cycle(&sim.id).await.unwrap();

    let err = rt.pause(&sim.id).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::TerminalState { .. }));
}

// ---------------------------------------------------------------------------
// Handler effects without a gateway
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_event_generation_seeds_the_scenario_once() {
    let rt = runtime("seed").await;
    let sim = rt.create_simulation(new_sim("Town", 5)).await.unwrap();
    rt.step(&sim.id, None).await.unwrap();

    let seeded = rt.step(&sim.id, None).await.unwrap();
    assert_eq!(seeded.executed_phase, Phase::EventGeneration);
    assert_eq!(seeded.generated_event_ids.len(), 1);
    assert_eq!(seeded.generated_action_ids.len(), 1);

    let loaded = rt.get_simulation(&sim.id).await.unwrap();
    assert_eq!(loaded.active_actor_ids.len(), 3);
    assert_eq!(loaded.pending_event_ids.len(), 1);
    assert_eq!(loaded.pending_action_ids.len(), 1);
    let marker = loaded.metadata.scenario.as_ref().unwrap();
    assert!(marker.seeded);
    assert_eq!(marker.scenario_key, "simple_town");
    assert!(loaded.metadata.last_event_generation_at.is_some());
    assert!(rt.store().actors().exists("actor-mayor").await.unwrap());

    rt.run_cycle(&sim.id).await.unwrap();
    let again = rt.step(&sim.id, None).await.unwrap();
    assert_eq!(again.executed_phase, Phase::EventGeneration);
    assert!(again.generated_event_ids.is_empty());
    assert_eq!(again.simulation.active_actor_ids.len(), 3);
}

#[tokio::test]
async fn unknown_scenario_falls_back_to_default() {
    let rt = runtime("fallback").await;
    let request = NewSimulation {
        scenario: Some("Atlantis".to_owned()),
        ..new_sim("Lost", 5)
    };
    let sim = rt.create_simulation(request).await.unwrap();
    assert_eq!(sim.scenario_key, "atlantis");

    rt.step(&sim.id, None).await.unwrap();
    let seeded = rt.step(&sim.id, None).await.unwrap();
    let marker = seeded.simulation.metadata.scenario.as_ref().unwrap();
    assert_eq!(marker.scenario_key, "simple_town");
    assert_eq!(seeded.simulation.active_actor_ids.len(), 3);
}

#[tokio::test]
async fn actions_resolve_generically_without_gateway() {
    let rt = runtime("generic").await;
    let sim = rt.create_simulation(new_sim("Town", 5)).await.unwrap();
    for _ in 0..4 {
        rt.step(&sim.id, None).await.unwrap();
    }

    let loaded = rt.get_simulation(&sim.id).await.unwrap();
    assert_eq!(loaded.current_phase, Phase::WorldUpdate);
    assert!(loaded.pending_action_ids.is_empty());

    let action = rt
        .store()
        .actions()
        .get("action-briefing-start")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(action.status, ActionStatus::Completed);
    assert_eq!(action.outcome.as_deref(), Some(GENERIC_OUTCOME));
    assert!(action.resolved_at.is_some());
}

#[tokio::test]
async fn action_collection_drops_settled_and_missing_actions() {
    let rt = runtime("collection").await;
    let sim = rt.create_simulation(new_sim("Town", 5)).await.unwrap();
    rt.step(&sim.id, None).await.unwrap();
    rt.step(&sim.id, None).await.unwrap();

    let mut action = rt
        .store()
        .actions()
        .get("action-briefing-start")
        .await
        .unwrap()
        .unwrap();
    action.cancel();
    rt.store().actions().save(&action).await.unwrap();

    let mut loaded = rt.get_simulation(&sim.id).await.unwrap();
    loaded.add_pending_action("act-ghost".into());
    rt.store().simulations().save(&loaded).await.unwrap();

    let result = rt.step(&sim.id, None).await.unwrap();
    assert_eq!(result.executed_phase, Phase::ActionCollection);
    assert!(result.simulation.pending_action_ids.is_empty());
    assert!(result.notes.iter().any(|n| n.contains("Dropped 2")));
}

#[tokio::test]
async fn world_update_applies_event_effects_and_clears_pending_events() {
    let rt = runtime("world_update").await;
    let sim = rt.create_simulation(new_sim("Town", 5)).await.unwrap();
    rt.step(&sim.id, None).await.unwrap();
    rt.step(&sim.id, None).await.unwrap();

    let mut event = rt
        .store()
        .events()
        .get("event-briefing")
        .await
        .unwrap()
        .unwrap();
    let mut effects = ActorEffects::default();
    effects
        .attribute_changes
        .insert("informed".to_owned(), Value::Bool(true));
    event.effects.insert("actor-doctor".to_owned(), effects);
    rt.store().events().save(&event).await.unwrap();

    rt.step(&sim.id, None).await.unwrap();
    rt.step(&sim.id, None).await.unwrap();
    let result = rt.step(&sim.id, None).await.unwrap();
    assert_eq!(result.executed_phase, Phase::WorldUpdate);
    assert!(result.simulation.pending_event_ids.is_empty());

    let resolved = rt
        .store()
        .events()
        .get("event-briefing")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.status, EventStatus::Resolved);

    let doctor = rt
        .store()
        .actors()
        .get("actor-doctor")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doctor.attributes.get("informed"), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn phase_log_and_snapshot_history_follow_settings() {
    let mut config = ChronicleConfig::default();
    config.coordinator.snapshot_history_limit = Some(1);
    let rt = runtime_at(temp_path("history"), config).await;
    let sim = rt.create_simulation(new_sim("Town", 5)).await.unwrap();
    rt.run_cycle(&sim.id).await.unwrap();
    rt.run_cycle(&sim.id).await.unwrap();

    let loaded = rt.get_simulation(&sim.id).await.unwrap();
    assert_eq!(loaded.snapshot_count, 2);
    assert_eq!(loaded.metadata.snapshots.len(), 1);
    assert_eq!(loaded.metadata.snapshots[0].cycle_number, 1);
    assert_eq!(loaded.metadata.snapshots[0].actor_count, 3);
    assert_eq!(loaded.metadata.phase_log.len(), 11);
    assert_eq!(loaded.metadata.phase_log[0].phase, Phase::Initialize);
    assert!(!loaded.metadata.phase_log[0].notes.is_empty());

    let mut quiet = ChronicleConfig::default();
    quiet.coordinator.persist_phase_notes = false;
    let rt = runtime_at(temp_path("quiet"), quiet).await;
    let sim = rt.create_simulation(new_sim("Town", 5)).await.unwrap();
    rt.run_cycle(&sim.id).await.unwrap();
    let loaded = rt.get_simulation(&sim.id).await.unwrap();
    assert!(loaded.metadata.phase_log.is_empty());
}

// ---------------------------------------------------------------------------
// Scenario hooks
// ---------------------------------------------------------------------------

/// Adds entities from every hook and counts how often each hook ran.
#[derive(Default)]
struct HarvestFair {
    before: AtomicUsize,
    after: AtomicUsize,
    snapshots: AtomicUsize,
}

impl Scenario for HarvestFair {
    fn key(&self) -> &'static str {
        "harvest_fair"
    }

    fn description(&self) -> &'static str {
        "A host announces the fair every cycle."
    }

    fn seed(&self, context: &mut ScenarioContext) {
        context
            .actors
            .push(Actor::new(ActorId::from("actor-host"), "Host", ActorType::Npc));
    }

    fn before_phase(&self, context: &mut ScenarioContext) {
        let n = self.before.fetch_add(1, Ordering::SeqCst) + 1;
        context.actors.push(Actor::new(
            ActorId::from(format!("actor-visitor-{n}")),
            "Visitor",
            ActorType::Npc,
        ));
        context.events.push(Event::new(
            EventId::from(format!("event-before-{n}")),
            "Stalls open",
            EventType::Social,
        ));
    }

    fn after_phase(&self, context: &mut ScenarioContext) {
        let n = self.after.fetch_add(1, Ordering::SeqCst) + 1;
        context.actions.push(Action::new(
            ActionId::from(format!("action-after-{n}")),
            ActorId::from("actor-host"),
            context.simulation.id.clone(),
            ActionType::Custom,
            "Ring the bell",
        ));
    }

    fn on_snapshot(&self, context: &mut ScenarioContext) {
        let n = self.snapshots.fetch_add(1, Ordering::SeqCst) + 1;
        context.events.push(Event::new(
            EventId::from(format!("event-snapshot-{n}")),
            "Fair tally",
            EventType::Economic,
        ));
    }
}

async fn runtime_with_scenario(name: &str, scenario: Arc<HarvestFair>) -> Runtime {
    let store = EntityStore::open(&BackendConfig::Local {
        path: temp_path(name),
    })
    .await
    .expect("open local store");
    let mut registry = ScenarioRegistry::with_builtins();
    registry.register(scenario).unwrap();
    Runtime::from_parts(ChronicleConfig::default(), store, None, registry)
}

#[tokio::test]
async fn scenario_hooks_persist_and_register_their_entities() {
    let fair = Arc::new(HarvestFair::default());
    let rt = runtime_with_scenario("hooks", Arc::clone(&fair)).await;
    let sim = rt
        .create_simulation(NewSimulation {
            scenario: Some("harvest_fair".to_owned()),
            ..new_sim("Fair", 2)
        })
        .await
        .unwrap();

    rt.step(&sim.id, None).await.unwrap();
    let generation = rt.step(&sim.id, None).await.unwrap();
    assert_eq!(generation.executed_phase, Phase::EventGeneration);
    assert_eq!(fair.before.load(Ordering::SeqCst), 1);
    assert_eq!(fair.after.load(Ordering::SeqCst), 1);
    assert_eq!(
        generation.generated_event_ids,
        vec![EventId::from("event-before-1")]
    );
    assert_eq!(
        generation.generated_action_ids,
        vec![ActionId::from("action-after-1")]
    );

    let loaded = rt.get_simulation(&sim.id).await.unwrap();
    assert_eq!(
        loaded.active_actor_ids,
        vec![ActorId::from("actor-host"), ActorId::from("actor-visitor-1")]
    );
    assert!(loaded.pending_event_ids.contains(&EventId::from("event-before-1")));
    assert!(loaded.pending_action_ids.contains(&ActionId::from("action-after-1")));
    assert!(rt.store().actors().exists("actor-host").await.unwrap());
    assert!(rt.store().actors().exists("actor-visitor-1").await.unwrap());
    assert!(rt.store().events().exists("event-before-1").await.unwrap());
    assert!(rt.store().actions().exists("action-after-1").await.unwrap());

    // action_collection, action_resolution, world_update, snapshot
    let mut snapshot = None;
    for _ in 0..4 {
        snapshot = Some(rt.step(&sim.id, None).await.unwrap());
    }
    let snapshot = snapshot.unwrap();
    assert_eq!(snapshot.executed_phase, Phase::Snapshot);
    assert_eq!(fair.snapshots.load(Ordering::SeqCst), 1);
    assert_eq!(
        snapshot.generated_event_ids,
        vec![EventId::from("event-snapshot-1")]
    );
    assert!(rt.store().events().exists("event-snapshot-1").await.unwrap());
    let loaded = rt.get_simulation(&sim.id).await.unwrap();
    assert!(loaded.pending_event_ids.contains(&EventId::from("event-snapshot-1")));

    // The second cycle runs every hook again on the stored working set.
    let results = rt.run_cycle(&sim.id).await.unwrap();
    assert_eq!(results.last().unwrap().executed_phase, Phase::Snapshot);
    assert_eq!(fair.before.load(Ordering::SeqCst), 2);
    assert_eq!(fair.after.load(Ordering::SeqCst), 2);
    assert_eq!(fair.snapshots.load(Ordering::SeqCst), 2);
    for id in ["event-before-2", "event-snapshot-2"] {
        assert!(rt.store().events().exists(id).await.unwrap(), "{id} missing");
    }
    assert!(rt.store().actions().exists("action-after-2").await.unwrap());
    assert_eq!(rt.store().actors().list(None).await.unwrap().len(), 3);
    let done = rt.get_simulation(&sim.id).await.unwrap();
    assert!(done.active_actor_ids.contains(&ActorId::from("actor-visitor-2")));
}

// ---------------------------------------------------------------------------
// Concurrency and persistence
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_steps_on_one_simulation_are_serialized() {
    let rt = Arc::new(runtime("serialized").await);
    let sim = rt.create_simulation(new_sim("Town", 5)).await.unwrap();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let rt = Arc::clone(&rt);
            let id = sim.id.clone();
            tokio::spawn(async move { rt.step(&id, None).await })
        })
        .collect();

    let mut executed = Vec::new();
    for handle in handles {
        executed.push(handle.await.unwrap().unwrap().executed_phase);
    }
    executed.sort();
    let mut expected = Phase::CANONICAL.to_vec();
    expected.sort();
    assert_eq!(executed, expected);

    let loaded = rt.get_simulation(&sim.id).await.unwrap();
    assert_eq!(loaded.cycle_number, 1);
    assert_eq!(loaded.metadata.phase_log.len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn steps_on_different_simulations_run_independently() {
    let rt = Arc::new(runtime("independent").await);
    let a = rt.create_simulation(new_sim("A", 5)).await.unwrap();
    let b = rt.create_simulation(new_sim("B", 5)).await.unwrap();

    let (ra, rb) = tokio::join!(rt.run_cycle(&a.id), rt.run_cycle(&b.id));
    assert_eq!(ra.unwrap().len(), 6);
    assert_eq!(rb.unwrap().len(), 6);
    assert_eq!(rt.get_simulation(&a.id).await.unwrap().cycle_number, 1);
    assert_eq!(rt.get_simulation(&b.id).await.unwrap().cycle_number, 1);
    assert_eq!(rt.coordinator().lock_count(), 2);
}

#[tokio::test]
async fn failed_write_back_surfaces_as_persistence_failure() {
    let path = temp_path("persist_fail");
    let rt = runtime_at(path.clone(), ChronicleConfig::default()).await;
    let sim = rt.create_simulation(new_sim("Town", 5)).await.unwrap();

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();

    let err = rt.step(&sim.id, None).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::PersistenceFailed { .. }));

    let reloaded = rt.get_simulation(&sim.id).await.unwrap();
    assert_eq!(reloaded.status, SimulationStatus::Created);
    assert_eq!(reloaded.current_phase, Phase::Initialize);
}
