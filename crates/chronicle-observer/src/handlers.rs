//! REST API endpoint handlers for the Observer server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/simulations` | List simulation summaries |
//! | `POST` | `/api/simulations` | Create a simulation |
//! | `DELETE` | `/api/simulations` | Delete every simulation (`?entities=true` clears all records) |
//! | `GET` | `/api/simulations/{id}` | Full simulation record |
//! | `DELETE` | `/api/simulations/{id}` | Delete a simulation |
//! | `POST` | `/api/simulations/{id}/step` | Execute one phase |
//! | `POST` | `/api/simulations/{id}/cycle` | Execute phases through the next snapshot |
//! | `POST` | `/api/simulations/{id}/pause` | Pause |
//! | `POST` | `/api/simulations/{id}/resume` | Resume |
//! | `POST` | `/api/simulations/{id}/actions` | Inject an action |
//! | `POST` | `/api/simulations/{id}/actors` | Register an existing actor |
//! | `GET` | `/api/actors` | List actor summaries |
//! | `POST` | `/api/actors` | Create a standalone actor |
//! | `GET` | `/api/actors/{id}` | Full actor record |
//! | `PUT` | `/api/actors/{id}` | Update an actor |
//! | `DELETE` | `/api/actors/{id}` | Delete an actor |
//! | `GET` | `/api/scenarios` | Registered scenarios |
//! | `POST` | `/api/llm/check` | Gateway configuration and readiness |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use chronicle_core::{
    ActionRequest, ActorUpdate, NewActor, NewSimulation, PhaseReport, PhaseResult,
    SimulationSummary,
};
use chronicle_types::{
    ActionPriority, ActionType, Actor, ActorId, ActorType, FieldMap, Phase, SimulationId,
};
use validator::Validate;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Query parameters for `GET /api/simulations`.
#[derive(Debug, serde::Deserialize)]
pub struct ListQuery {
    /// Maximum number of simulations to return.
    pub limit: Option<usize>,
}

/// Request body for `POST /api/simulations`.
#[derive(Debug, serde::Deserialize, Validate)]
pub struct CreateSimulationRequest {
    /// Display name.
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Optional description.
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    /// Scenario key; the configured default when absent.
    #[validate(length(min = 1, max = 100))]
    pub scenario: Option<String>,
    /// Cycle limit; the configured default when absent.
    #[validate(range(min = 1, max = 100_000))]
    pub max_cycles: Option<u64>,
    /// Caller configuration stored on the simulation.
    #[serde(default)]
    pub configuration: FieldMap,
}

/// Query parameters for `POST /api/simulations/{id}/step`.
#[derive(Debug, serde::Deserialize)]
pub struct StepQuery {
    /// Phase to execute instead of the recorded one.
    pub phase: Option<String>,
}

/// Request body for `POST /api/simulations/{id}/actions`.
#[derive(Debug, serde::Deserialize, Validate)]
pub struct InjectActionRequest {
    /// The acting actor; unknown ids get a lightweight NPC.
    #[validate(length(min = 1, max = 200))]
    pub actor_id: String,
    /// What the actor intends to do.
    #[validate(length(min = 1, max = 2000))]
    pub intent: String,
    /// Longer description.
    pub description: Option<String>,
    /// Action category.
    pub action_type: Option<ActionType>,
    /// Urgency.
    pub priority: Option<ActionPriority>,
    /// Action parameters.
    #[serde(default)]
    pub parameters: FieldMap,
    /// Free-form metadata; `actor_name` names an auto-created actor.
    #[serde(default)]
    pub metadata: FieldMap,
}

/// Request body for `POST /api/simulations/{id}/actors`.
#[derive(Debug, serde::Deserialize, Validate)]
pub struct AddActorRequest {
    /// An actor that already exists in the store.
    #[validate(length(min = 1, max = 200))]
    pub actor_id: String,
}

/// Query parameters for `DELETE /api/simulations`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ClearQuery {
    /// Also remove every actor, event, and action.
    #[serde(default)]
    pub entities: bool,
}

/// Request body for `POST /api/actors`.
#[derive(Debug, serde::Deserialize, Validate)]
pub struct CreateActorRequest {
    /// Display name.
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Participant kind.
    #[serde(rename = "type")]
    pub actor_type: ActorType,
    /// Free-form attributes.
    #[serde(default)]
    pub attributes: FieldMap,
    /// Starting location.
    pub location: Option<FieldMap>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: FieldMap,
}

/// Request body for `PUT /api/actors/{id}`. Absent fields stay unchanged.
#[derive(Debug, serde::Deserialize, Validate)]
pub struct UpdateActorRequest {
    /// New display name.
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    /// New participant kind.
    #[serde(rename = "type")]
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

/// One row of `GET /api/actors`.
#[derive(Debug, serde::Serialize)]
struct ActorSummary<'a> {
    id: &'a ActorId,
    name: &'a str,
    #[serde(rename = "type")]
    actor_type: ActorType,
    active: bool,
    last_updated: DateTime<Utc>,
}

impl<'a> From<&'a Actor> for ActorSummary<'a> {
    fn from(actor: &'a Actor) -> Self {
        Self {
            id: &actor.id,
            name: &actor.name,
            actor_type: actor.actor_type,
            active: actor.active,
            last_updated: actor.updated_at,
        }
    }
}

/// Generic success response.
#[derive(Debug, serde::Serialize)]
struct OperationResponse {
    /// Whether the operation succeeded.
    ok: bool,
    /// Human-readable message.
    message: String,
}

// ---------------------------------------------------------------------------
// Simulations
// ---------------------------------------------------------------------------

/// List simulation summaries in creation order.
pub async fn list_simulations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let summaries = state.runtime().list_summaries(query.limit).await?;
    Ok(Json(serde_json::json!({
        "count": summaries.len(),
        "simulations": summaries,
    })))
}

/// Create a simulation. Responds `201 Created` with the new record.
pub async fn create_simulation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSimulationRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    body.validate()?;
    let simulation = state
        .runtime()
        .create_simulation(NewSimulation {
            name: body.name.trim().to_owned(),
            description: body.description,
            scenario: body.scenario,
            max_cycles: body.max_cycles,
            configuration: body.configuration,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(simulation)))
}

/// Delete every simulation; with `?entities=true` also every actor, event,
/// and action.
pub async fn clear_simulations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClearQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let report = state.runtime().clear(query.entities).await?;
    Ok(Json(report))
}

/// Return the full simulation record.
pub async fn get_simulation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let simulation = state.runtime().get_simulation(&SimulationId::from(id)).await?;
    Ok(Json(simulation))
}

/// Delete a simulation record.
pub async fn delete_simulation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let simulation_id = SimulationId::from(id);
    state.runtime().delete_simulation(&simulation_id).await?;
    Ok(Json(OperationResponse {
        ok: true,
        message: format!("Simulation {simulation_id} deleted"),
    }))
}

// ---------------------------------------------------------------------------
// Phase control
// ---------------------------------------------------------------------------

/// Execute one phase, optionally naming it.
///
/// An unknown phase name is rejected with `422`; a phase out of sequence
/// with `409`.
pub async fn step_simulation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<StepQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let requested = query
        .phase
        .as_deref()
        .map(str::parse::<Phase>)
        .transpose()?;
    if let Some(phase) = requested.filter(|p| !p.is_canonical()) {
        return Err(ObserverError::NonCanonicalPhase(phase));
    }

    let result = state
        .runtime()
        .step(&SimulationId::from(id), requested)
        .await?;
    let report = result.report();
    let summary = SimulationSummary::from(&result.simulation);
    Ok(Json(serde_json::json!({
        "simulation": summary,
        "phase_result": report,
    })))
}

/// Execute phases until the next snapshot completes or the simulation
/// stops.
pub async fn run_cycle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let simulation_id = SimulationId::from(id);
    let results = state.runtime().run_cycle(&simulation_id).await?;
    let phases: Vec<PhaseReport> = results.iter().map(PhaseResult::report).collect();
    let summary = state.runtime().simulation_summary(&simulation_id).await?;
    Ok(Json(serde_json::json!({
        "simulation": summary,
        "phases": phases,
    })))
}

/// Pause a simulation.
pub async fn pause_simulation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let simulation = state.runtime().pause(&SimulationId::from(id)).await?;
    Ok(Json(SimulationSummary::from(&simulation)))
}

/// Resume a paused simulation.
pub async fn resume_simulation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let simulation = state.runtime().resume(&SimulationId::from(id)).await?;
    Ok(Json(SimulationSummary::from(&simulation)))
}

// ---------------------------------------------------------------------------
// Actions and actors
// ---------------------------------------------------------------------------

/// Queue an action for the next resolution phase. Responds `201 Created`
/// with the stored action.
pub async fn inject_action(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<InjectActionRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    body.validate()?;
    let action = state
        .runtime()
        .inject_action(
            &SimulationId::from(id),
            ActionRequest {
                actor_id: body.actor_id,
                intent: body.intent,
                description: body.description,
                action_type: body.action_type,
                priority: body.priority,
                parameters: body.parameters,
                metadata: body.metadata,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(action)))
}

/// Register an existing actor on a simulation.
pub async fn add_actor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<AddActorRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    body.validate()?;
    let simulation = state
        .runtime()
        .add_actor(&SimulationId::from(id), &ActorId::from(body.actor_id.trim()))
        .await?;
    Ok(Json(SimulationSummary::from(&simulation)))
}

// ---------------------------------------------------------------------------
// Standalone actors
// ---------------------------------------------------------------------------

/// List actor summaries in creation order.
pub async fn list_actors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let actors = state.runtime().list_actors(query.limit).await?;
    let summaries: Vec<ActorSummary<'_>> = actors.iter().map(ActorSummary::from).collect();
    Ok(Json(serde_json::json!({
        "count": summaries.len(),
        "actors": summaries,
    })))
}

/// Create an actor. Responds `201 Created` with the stored record.
pub async fn create_actor(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateActorRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    body.validate()?;
    let actor = state
        .runtime()
        .create_actor(NewActor {
            name: body.name.trim().to_owned(),
            actor_type: body.actor_type,
            attributes: body.attributes,
            location: body.location,
            metadata: body.metadata,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(actor)))
}

/// Return the full actor record.
pub async fn get_actor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let actor = state.runtime().get_actor(&ActorId::from(id)).await?;
    Ok(Json(actor))
}

/// Update the given fields of an actor.
pub async fn update_actor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateActorRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    body.validate()?;
    let actor = state
        .runtime()
        .update_actor(
            &ActorId::from(id),
            ActorUpdate {
                name: body.name.map(|name| name.trim().to_owned()),
                actor_type: body.actor_type,
                active: body.active,
                attributes: body.attributes,
                location: body.location,
                metadata: body.metadata,
            },
        )
        .await?;
    Ok(Json(actor))
}

/// Delete an actor. Responds `204 No Content`.
pub async fn delete_actor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    state.runtime().delete_actor(&ActorId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Scenarios and gateway
// ---------------------------------------------------------------------------

/// List registered scenarios with their descriptions.
#[allow(clippy::unused_async)]
pub async fn list_scenarios(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let scenarios: Vec<_> = state
        .runtime()
        .scenarios()
        .into_iter()
        .map(|(key, description)| serde_json::json!({ "key": key, "description": description }))
        .collect();
    Json(serde_json::json!({
        "count": scenarios.len(),
        "default": state.runtime().config().coordinator.default_scenario,
        "scenarios": scenarios,
    }))
}

/// Report whether the gateway is configured and answering.
pub async fn check_gateway(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.runtime().check_gateway().await)
}
