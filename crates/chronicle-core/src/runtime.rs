//! The runtime context: one explicitly constructed object owning the store,
//! gateway, scenarios, coordinator, and notification hub.
//!
//! Every operation that mutates a simulation takes that simulation's lock,
//! persists, and publishes a notification before releasing it. Standalone
//! actor records are not tied to one simulation and take no lock.

use std::sync::Arc;
use std::time::Duration;

use chronicle_gateway::{Gateway, GatewayConfig};
use chronicle_scenario::{ScenarioRegistry, normalize_key};
use chronicle_store::{EntityStore, StoreError};
use chronicle_types::{
    Action, ActionId, ActionPriority, ActionType, Actor, ActorId, ActorType, FieldMap, Phase,
    Simulation, SimulationId, SimulationStatus,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::ChronicleConfig;
use crate::coordinator::Coordinator;
use crate::error::{CoordinatorError, RuntimeError};
use crate::notify::{NotificationHub, StreamEvent, Subscription, events};
use crate::phase::PhaseResult;
use crate::summary::SimulationSummary;

/// Parameters for a new simulation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewSimulation {
    /// Display name.
    pub name: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Scenario key; the configured default when absent.
    pub scenario: Option<String>,
    /// Cycle limit; the configured default when absent.
    pub max_cycles: Option<u64>,
    /// Caller configuration stored on the simulation.
    pub configuration: FieldMap,
}

/// An action submitted from outside the phase cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionRequest {
    /// The acting actor. Unknown ids get a lightweight NPC.
    pub actor_id: String,
    /// What the actor intends to do.
    pub intent: String,
    /// Longer description.
    pub description: Option<String>,
    /// Category; `custom` when absent.
    pub action_type: Option<ActionType>,
    /// Urgency; `normal` when absent.
    pub priority: Option<ActionPriority>,
    /// Action parameters.
    pub parameters: FieldMap,
    /// Free-form metadata. `actor_name` names an auto-created actor.
    pub metadata: FieldMap,
}

/// Parameters for a standalone actor record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewActor {
    /// Display name.
    pub name: String,
    /// Participant kind.
    pub actor_type: ActorType,
    /// Free-form attributes.
    pub attributes: FieldMap,
    /// Starting location.
    pub location: Option<FieldMap>,
    /// Free-form metadata.
    pub metadata: FieldMap,
}

/// Field changes for an existing actor. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActorUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New participant kind.
    pub actor_type: Option<ActorType>,
    /// Whether the actor takes part in new phases.
    pub active: Option<bool>,
    /// Replacement attributes.
    pub attributes: Option<FieldMap>,
    /// Replacement location.
    pub location: Option<FieldMap>,
    /// Replacement metadata.
    pub metadata: Option<FieldMap>,
}

/// Whether the generative-text gateway is configured and answering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayStatus {
    /// A gateway is configured.
    pub available: bool,
    /// The gateway answered a test request.
    pub ready: bool,
    /// Provider labels in fallback order.
    pub providers: Vec<String>,
    /// Why the gateway is unavailable or not ready.
    pub detail: Option<String>,
}

/// Records removed by [`Runtime::clear`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    /// Simulations deleted.
    pub simulations: usize,
    /// Actors removed.
    pub actors: usize,
    /// Events removed.
    pub events: usize,
    /// Actions removed.
    pub actions: usize,
}

/// The running Chronicle system.
pub struct Runtime {
    config: ChronicleConfig,
    coordinator: Coordinator,
}

impl Runtime {
    /// Open the configured store, read gateway settings from the
    /// environment, and assemble the coordinator.
    pub async fn initialize(config: ChronicleConfig) -> Result<Self, RuntimeError> {
        let store = EntityStore::open(&config.store.backend_config()).await?;
        let gateway = GatewayConfig::from_env()?
            .map(|gateway_config| Gateway::from_config(&gateway_config))
            .transpose()?;
        let scenarios =
            ScenarioRegistry::with_builtins().with_default(&config.coordinator.default_scenario);

        info!(
            store = store.backend_name(),
            gateway = ?gateway.as_ref().map(Gateway::providers),
            scenarios = ?scenarios.keys(),
            "runtime initialized"
        );
        Ok(Self::from_parts(config, store, gateway, scenarios))
    }

    /// Assemble a runtime from already constructed parts.
    pub fn from_parts(
        config: ChronicleConfig,
        store: EntityStore,
        gateway: Option<Gateway>,
        scenarios: ScenarioRegistry,
    ) -> Self {
        let hub = Arc::new(NotificationHub::new(config.notifications.queue_capacity));
        let coordinator = Coordinator::new(store, gateway, scenarios, config.coordinator.clone(), hub);
        Self {
            config,
            coordinator,
        }
    }

    /// Close every subscriber queue and release the store.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        self.coordinator.hub().close_all();
        self.coordinator.store().shutdown().await?;
        info!("runtime shut down");
        Ok(())
    }

    /// The loaded configuration.
    pub const fn config(&self) -> &ChronicleConfig {
        &self.config
    }

    /// The phase coordinator.
    pub const fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// The Entity Store.
    pub const fn store(&self) -> &EntityStore {
        self.coordinator.store()
    }

    /// The notification hub.
    pub const fn hub(&self) -> &Arc<NotificationHub> {
        self.coordinator.hub()
    }

    /// How long a subscriber may sit idle before a heartbeat.
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.config.notifications.heartbeat_secs)
    }

    // -----------------------------------------------------------------------
    // Phase cycle
    // -----------------------------------------------------------------------

    /// Execute one phase. See [`Coordinator::step`].
    pub async fn step(
        &self,
        simulation_id: &SimulationId,
        force_phase: Option<Phase>,
    ) -> Result<PhaseResult, CoordinatorError> {
        self.coordinator.step(simulation_id, force_phase).await
    }

    /// Run one full cycle. See [`Coordinator::run_cycle`].
    pub async fn run_cycle(
        &self,
        simulation_id: &SimulationId,
    ) -> Result<Vec<PhaseResult>, CoordinatorError> {
        self.coordinator.run_cycle(simulation_id).await
    }

    // -----------------------------------------------------------------------
    // Simulation lifecycle
    // -----------------------------------------------------------------------

    /// Create and persist a simulation in its initial state.
    pub async fn create_simulation(
        &self,
        request: NewSimulation,
    ) -> Result<Simulation, CoordinatorError> {
        let settings = self.coordinator.settings();
        let scenario_key = request
            .scenario
            .as_deref()
            .map(normalize_key)
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| settings.default_scenario.clone());
        let max_cycles = request.max_cycles.unwrap_or(settings.default_max_cycles);

        let mut simulation =
            Simulation::new(SimulationId::generate(), request.name, scenario_key, max_cycles);
        simulation.description = request.description.unwrap_or_default();
        simulation.configuration = request.configuration;

        let _guard = self.coordinator.lock(&simulation.id).await;
        self.store().simulations().create(&simulation).await?;
        info!(
            simulation_id = %simulation.id,
            scenario = %simulation.scenario_key,
            max_cycles,
            "simulation created"
        );
        self.coordinator
            .publish(&StreamEvent::for_simulation(events::CREATED, &simulation));
        Ok(simulation)
    }

    /// Fetch one simulation.
    pub async fn get_simulation(
        &self,
        simulation_id: &SimulationId,
    ) -> Result<Simulation, CoordinatorError> {
        self.coordinator.load(simulation_id).await
    }

    /// List simulations in store order.
    pub async fn list_simulations(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<Simulation>, CoordinatorError> {
        Ok(self.store().simulations().list(limit).await?)
    }

    /// Summaries of every simulation in store order.
    pub async fn list_summaries(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<SimulationSummary>, CoordinatorError> {
        let simulations = self.list_simulations(limit).await?;
        Ok(simulations.iter().map(SimulationSummary::from).collect())
    }

    /// Status, phase, cycle, and pending counts of one simulation.
    pub async fn simulation_summary(
        &self,
        simulation_id: &SimulationId,
    ) -> Result<SimulationSummary, CoordinatorError> {
        let simulation = self.get_simulation(simulation_id).await?;
        Ok(SimulationSummary::from(&simulation))
    }

    /// Delete a simulation record. Its actors, events, and actions remain.
    pub async fn delete_simulation(
        &self,
        simulation_id: &SimulationId,
    ) -> Result<(), CoordinatorError> {
        let _guard = self.coordinator.lock(simulation_id).await;
        let simulation = self.coordinator.load(simulation_id).await?;
        if !self.store().simulations().delete(simulation_id.as_str()).await? {
            return Err(CoordinatorError::simulation_not_found(simulation_id));
        }
        info!(simulation_id = %simulation_id, "simulation deleted");
        self.coordinator
            .publish(&StreamEvent::for_simulation(events::DELETED, &simulation));
        Ok(())
    }

    /// Suspend a simulation, remembering its phase. Pausing a paused
    /// simulation changes nothing.
    pub async fn pause(&self, simulation_id: &SimulationId) -> Result<Simulation, CoordinatorError> {
        let _guard = self.coordinator.lock(simulation_id).await;
        let mut simulation = self.load_mutable(simulation_id).await?;
        if simulation.status == SimulationStatus::Paused {
            return Ok(simulation);
        }
        let paused_from = simulation.current_phase;
        simulation.pause();
        self.coordinator.persist(&simulation).await?;
        info!(simulation_id = %simulation_id, paused_from = %paused_from, "simulation paused");
        self.coordinator.publish(
            &StreamEvent::for_simulation(events::PAUSED, &simulation)
                .with_metadata("paused_from", paused_from.as_str()),
        );
        Ok(simulation)
    }

    /// Resume a paused simulation at the phase it was paused from. Resuming
    /// a simulation that is not paused changes nothing.
    pub async fn resume(
        &self,
        simulation_id: &SimulationId,
    ) -> Result<Simulation, CoordinatorError> {
        let _guard = self.coordinator.lock(simulation_id).await;
        let mut simulation = self.load_mutable(simulation_id).await?;
        if !simulation.resume() {
            return Ok(simulation);
        }
        self.coordinator.persist(&simulation).await?;
        info!(
            simulation_id = %simulation_id,
            phase = %simulation.current_phase,
            "simulation resumed"
        );
        self.coordinator
            .publish(&StreamEvent::for_simulation(events::RESUMED, &simulation));
        Ok(simulation)
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    /// Queue an action for the next resolution phase.
    ///
    /// An unknown actor id gets a lightweight NPC, named from the request's
    /// `actor_name` metadata or else the id, which is registered on the
    /// simulation.
    pub async fn inject_action(
        &self,
        simulation_id: &SimulationId,
        request: ActionRequest,
    ) -> Result<Action, CoordinatorError> {
        let _guard = self.coordinator.lock(simulation_id).await;
        let mut simulation = self.load_mutable(simulation_id).await?;

        let actor_id = ActorId::from(request.actor_id.trim());
        if !self.store().actors().exists(actor_id.as_str()).await? {
            let name = request
                .metadata
                .get("actor_name")
                .and_then(Value::as_str)
                .filter(|name| !name.trim().is_empty())
                .map_or_else(|| actor_id.to_string(), ToOwned::to_owned);
            let mut actor = Actor::new(actor_id.clone(), name, ActorType::Npc);
            actor
                .metadata
                .insert("auto_created".to_owned(), Value::Bool(true));
            self.store().actors().create(&actor).await?;
            simulation.add_actor(actor_id.clone());
            info!(simulation_id = %simulation_id, actor_id = %actor_id, "actor auto-created");
        }

        let mut action = Action::new(
            ActionId::generate(),
            actor_id,
            simulation.id.clone(),
            request.action_type.unwrap_or(ActionType::Custom),
            request.intent,
        );
        action.description = request.description.unwrap_or_default();
        action.priority = request.priority.unwrap_or(ActionPriority::Normal);
        action.parameters = request.parameters;
        action.metadata = request.metadata;
        self.store().actions().create(&action).await?;

        simulation.add_pending_action(action.id.clone());
        simulation.touch();
        self.coordinator.persist(&simulation).await?;
        info!(
            simulation_id = %simulation_id,
            action_id = %action.id,
            actor_id = %action.actor_id,
            "action injected"
        );
        self.coordinator.publish(
            &StreamEvent::for_simulation(events::ACTION_ADDED, &simulation)
                .with_metadata("action_id", action.id.as_str())
                .with_metadata("actor_id", action.actor_id.as_str()),
        );
        Ok(action)
    }

    /// Register an existing actor on a simulation. Registering an actor
    /// twice changes nothing.
    pub async fn add_actor(
        &self,
        simulation_id: &SimulationId,
        actor_id: &ActorId,
    ) -> Result<Simulation, CoordinatorError> {
        let _guard = self.coordinator.lock(simulation_id).await;
        let mut simulation = self.load_mutable(simulation_id).await?;
        if !self.store().actors().exists(actor_id.as_str()).await? {
            return Err(CoordinatorError::NotFound {
                kind: "actor",
                id: actor_id.to_string(),
            });
        }
        if !simulation.add_actor(actor_id.clone()) {
            return Ok(simulation);
        }
        simulation.touch();
        self.coordinator.persist(&simulation).await?;
        info!(simulation_id = %simulation_id, actor_id = %actor_id, "actor registered");
        self.coordinator.publish(
            &StreamEvent::for_simulation(events::ACTOR_ADDED, &simulation)
                .with_metadata("actor_id", actor_id.as_str()),
        );
        Ok(simulation)
    }

    /// Delete every simulation, publishing `simulation.deleted` for each.
    /// With `include_entities`, actors, events, and actions are removed too.
    pub async fn clear(&self, include_entities: bool) -> Result<ClearReport, CoordinatorError> {
        let mut report = ClearReport::default();
        for simulation in self.list_simulations(None).await? {
            match self.delete_simulation(&simulation.id).await {
                Ok(()) => report.simulations = report.simulations.saturating_add(1),
                // Deleted concurrently.
                Err(CoordinatorError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        if include_entities {
            report.actors = self.store().actors().clear().await?;
            report.events = self.store().events().clear().await?;
            report.actions = self.store().actions().clear().await?;
        }
        warn!(
            simulations = report.simulations,
            actors = report.actors,
            events = report.events,
            actions = report.actions,
            "store cleared"
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Actors
    // -----------------------------------------------------------------------

    /// Create a standalone actor with a generated id.
    pub async fn create_actor(&self, request: NewActor) -> Result<Actor, CoordinatorError> {
        let mut actor = Actor::new(ActorId::generate(), request.name, request.actor_type);
        actor.attributes = request.attributes;
        actor.location = request.location;
        actor.metadata = request.metadata;
        self.store().actors().create(&actor).await?;
        info!(actor_id = %actor.id, actor_type = %actor.actor_type, "actor created");
        Ok(actor)
    }

    /// Fetch one actor.
    pub async fn get_actor(&self, actor_id: &ActorId) -> Result<Actor, CoordinatorError> {
        self.store()
            .actors()
            .get(actor_id.as_str())
            .await?
            .ok_or_else(|| CoordinatorError::actor_not_found(actor_id))
    }

    /// List actors in store order.
    pub async fn list_actors(&self, limit: Option<usize>) -> Result<Vec<Actor>, CoordinatorError> {
        Ok(self.store().actors().list(limit).await?)
    }

    /// Apply `update` to an existing actor and return the stored result.
    pub async fn update_actor(
        &self,
        actor_id: &ActorId,
        update: ActorUpdate,
    ) -> Result<Actor, CoordinatorError> {
        let mut actor = self.get_actor(actor_id).await?;
        if let Some(name) = update.name {
            actor.name = name;
        }
        if let Some(actor_type) = update.actor_type {
            actor.actor_type = actor_type;
        }
        if let Some(active) = update.active {
            actor.active = active;
        }
        if let Some(attributes) = update.attributes {
            actor.attributes = attributes;
        }
        if let Some(location) = update.location {
            actor.location = Some(location);
        }
        if let Some(metadata) = update.metadata {
            actor.metadata = metadata;
        }
        actor.updated_at = Utc::now();
        if !self.store().actors().save(&actor).await? {
            return Err(CoordinatorError::actor_not_found(actor_id));
        }
        info!(actor_id = %actor_id, "actor updated");
        Ok(actor)
    }

    /// Delete an actor record. Simulations that list it keep the id; phases
    /// skip ids that no longer resolve.
    pub async fn delete_actor(&self, actor_id: &ActorId) -> Result<(), CoordinatorError> {
        if !self.store().actors().delete(actor_id.as_str()).await? {
            return Err(CoordinatorError::actor_not_found(actor_id));
        }
        info!(actor_id = %actor_id, "actor deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Scenarios and gateway
    // -----------------------------------------------------------------------

    /// Registered scenario keys with their descriptions, sorted by key.
    pub fn scenarios(&self) -> Vec<(&str, &'static str)> {
        self.coordinator.scenarios().describe()
    }

    /// Report whether a gateway is configured and send it one test request.
    pub async fn check_gateway(&self) -> GatewayStatus {
        let Some(gateway) = self.coordinator.gateway() else {
            return GatewayStatus {
                available: false,
                ready: false,
                providers: Vec::new(),
                detail: Some("gateway is not configured".to_owned()),
            };
        };
        let providers = gateway.providers().into_iter().map(ToOwned::to_owned).collect();
        match gateway.check().await {
            Ok(()) => GatewayStatus {
                available: true,
                ready: true,
                providers,
                detail: None,
            },
            Err(e) => {
                warn!(error = %e, "gateway check failed");
                GatewayStatus {
                    available: true,
                    ready: false,
                    providers,
                    detail: Some(e.to_string()),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// Subscribe to a simulation's notifications.
    ///
    /// Returns the subscription plus a `simulation.snapshot` frame describing
    /// the current state, to be delivered before queued events.
    ///
    /// The queue is registered before the simulation is loaded, so every
    /// event published after the snapshot was taken is also queued. A
    /// failed load drops the guard and unregisters the queue again.
    pub async fn subscribe(
        &self,
        simulation_id: &SimulationId,
    ) -> Result<(Subscription, StreamEvent), CoordinatorError> {
        let subscription = self.hub().subscribe_guarded(simulation_id);
        let simulation = self.get_simulation(simulation_id).await?;
        Ok((
            subscription,
            StreamEvent::for_simulation(events::SNAPSHOT, &simulation),
        ))
    }

    /// Load a simulation that is about to be mutated, rejecting terminal
    /// ones.
    async fn load_mutable(
        &self,
        simulation_id: &SimulationId,
    ) -> Result<Simulation, CoordinatorError> {
        let simulation = self.coordinator.load(simulation_id).await?;
        if simulation.status.is_terminal() {
            return Err(CoordinatorError::TerminalState {
                simulation_id: simulation.id,
                status: simulation.status,
            });
        }
        Ok(simulation)
    }
}
