//! Integration tests for the Observer API endpoints.
//!
//! Tests drive the Axum `Router` directly via `tower::ServiceExt` over a
//! runtime backed by a temporary local store, without starting a TCP
//! server.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing
)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, BodyDataStream};
use axum::http::{Request, StatusCode};
use chronicle_core::{ChronicleConfig, Runtime};
use chronicle_gateway::{Gateway, ScriptedBackend, ScriptedReply};
use chronicle_observer::router::build_router;
use chronicle_observer::state::AppState;
use chronicle_scenario::ScenarioRegistry;
use chronicle_store::{BackendConfig, EntityStore};
use chronicle_types::{Actor, ActorId, ActorType, SimulationId};
use futures::StreamExt;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn make_runtime(name: &str) -> Arc<Runtime> {
    make_runtime_with(name, None).await
}

async fn make_runtime_with(name: &str, gateway: Option<Gateway>) -> Arc<Runtime> {
    let dir = std::env::temp_dir().join(format!(
        "chronicle_observer_{name}_{}",
        std::process::id()
    ));
    std::fs::remove_dir_all(&dir).ok();
    let store = EntityStore::open(&BackendConfig::Local {
        path: dir.join("state.json"),
    })
    .await
    .unwrap();
    Arc::new(Runtime::from_parts(
        ChronicleConfig::default(),
        store,
        gateway,
        ScenarioRegistry::with_builtins(),
    ))
}

fn router_for(runtime: &Arc<Runtime>) -> Router {
    build_router(Arc::new(
        AppState::new(Arc::clone(runtime)).with_heartbeat(Duration::from_millis(20)),
    ))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn next_frame(body: &mut BodyDataStream) -> String {
    let chunk = body.next().await.unwrap().unwrap();
    String::from_utf8(chunk.to_vec()).unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

async fn create(router: &Router, name: &str, max_cycles: u64) -> String {
    let (status, json) = send(
        router,
        post_json(
            "/api/simulations",
            &json!({ "name": name, "max_cycles": max_cycles }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_str().unwrap().to_owned()
}

// =========================================================================
// Simulations
// =========================================================================

#[tokio::test]
async fn test_create_and_get_simulation() {
    let runtime = make_runtime("create").await;
    let router = router_for(&runtime);

    let id = create(&router, "Town", 4).await;
    assert!(id.starts_with("sim-"));

    let (status, json) = send(
        &router,
        Request::get(format!("/api/simulations/{id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Town");
    assert_eq!(json["status"], "created");
    assert_eq!(json["current_phase"], "initialize");
    assert_eq!(json["max_cycles"], 4);
    assert_eq!(json["scenario_key"], "simple_town");
}

#[tokio::test]
async fn test_create_rejects_invalid_body() {
    let runtime = make_runtime("create_invalid").await;
    let router = router_for(&runtime);

    let (status, json) = send(
        &router,
        post_json("/api/simulations", &json!({ "name": "", "max_cycles": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["status"], 422);
    assert!(json["error"].as_str().unwrap().contains("validation"));
}

#[tokio::test]
async fn test_list_simulations() {
    let runtime = make_runtime("list").await;
    let router = router_for(&runtime);
    create(&router, "First", 3).await;
    create(&router, "Second", 3).await;

    let (status, json) = send(
        &router,
        Request::get("/api/simulations").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["simulations"][0]["name"], "First");
    assert_eq!(json["simulations"][1]["pending_action_count"], 0);

    let (_, limited) = send(
        &router,
        Request::get("/api/simulations?limit=1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(limited["count"], 1);
}

#[tokio::test]
async fn test_get_simulation_not_found() {
    let runtime = make_runtime("not_found").await;
    let router = router_for(&runtime);

    let (status, json) = send(
        &router,
        Request::get("/api/simulations/sim-00000000")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_delete_simulation() {
    let runtime = make_runtime("delete").await;
    let router = router_for(&runtime);
    let id = create(&router, "Doomed", 3).await;

    let delete = || {
        Request::delete(format!("/api/simulations/{id}"))
            .body(Body::empty())
            .unwrap()
    };
    let (status, json) = send(&router, delete()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);

    let (status, _) = send(&router, delete()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clear_simulations() {
    let runtime = make_runtime("clear").await;
    let router = router_for(&runtime);
    let id = create(&router, "First", 3).await;
    create(&router, "Second", 3).await;
    send(&router, post_empty(&format!("/api/simulations/{id}/cycle"))).await;

    let (status, json) = send(
        &router,
        Request::delete("/api/simulations").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["simulations"], 2);
    assert_eq!(json["actors"], 0);

    let (_, listed) = send(
        &router,
        Request::get("/api/simulations").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(listed["count"], 0);

    let (status, json) = send(
        &router,
        Request::delete("/api/simulations?entities=true")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["simulations"], 0);
    assert_eq!(json["actors"], 3);
    assert!(runtime.list_actors(None).await.unwrap().is_empty());
}

// =========================================================================
// Phase control
// =========================================================================

#[tokio::test]
async fn test_step_advances_one_phase() {
    let runtime = make_runtime("step").await;
    let router = router_for(&runtime);
    let id = create(&router, "Town", 3).await;

    let (status, json) = send(&router, post_empty(&format!("/api/simulations/{id}/step"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phase_result"]["executed_phase"], "initialize");
    assert_eq!(json["phase_result"]["next_phase"], "event_generation");
    assert_eq!(json["simulation"]["status"], "running");
    assert_eq!(json["simulation"]["current_phase"], "event_generation");
}

#[tokio::test]
async fn test_step_phase_errors() {
    let runtime = make_runtime("step_errors").await;
    let router = router_for(&runtime);
    let id = create(&router, "Town", 3).await;

    let (status, _) = send(
        &router,
        post_empty(&format!("/api/simulations/{id}/step?phase=snapshot")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = send(
        &router,
        post_empty(&format!("/api/simulations/{id}/step?phase=sideways")),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].as_str().unwrap().contains("sideways"));

    let (status, _) = send(
        &router,
        post_empty(&format!("/api/simulations/{id}/step?phase=paused")),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_cycle_until_completed() {
    let runtime = make_runtime("cycle").await;
    let router = router_for(&runtime);
    let id = create(&router, "Town", 1).await;

    let (status, json) = send(&router, post_empty(&format!("/api/simulations/{id}/cycle"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phases"].as_array().unwrap().len(), 6);
    assert_eq!(json["phases"][5]["executed_phase"], "snapshot");
    assert_eq!(json["simulation"]["status"], "completed");
    assert_eq!(json["simulation"]["cycle_number"], 1);

    let (status, json) = send(&router, post_empty(&format!("/api/simulations/{id}/step"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["status"], 409);

    let (status, json) = send(&router, post_empty(&format!("/api/simulations/{id}/cycle"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phases"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_pause_and_resume() {
    let runtime = make_runtime("pause").await;
    let router = router_for(&runtime);
    let id = create(&router, "Town", 3).await;
    send(&router, post_empty(&format!("/api/simulations/{id}/step"))).await;

    let (status, json) = send(&router, post_empty(&format!("/api/simulations/{id}/pause"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "paused");
    assert_eq!(json["current_phase"], "paused");

    let (status, _) = send(&router, post_empty(&format!("/api/simulations/{id}/step"))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = send(&router, post_empty(&format!("/api/simulations/{id}/resume"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "running");
    assert_eq!(json["current_phase"], "event_generation");
}

// =========================================================================
// Actions and actors
// =========================================================================

#[tokio::test]
async fn test_inject_action() {
    let runtime = make_runtime("inject").await;
    let router = router_for(&runtime);
    let id = create(&router, "Town", 3).await;

    let (status, json) = send(
        &router,
        post_json(
            &format!("/api/simulations/{id}/actions"),
            &json!({
                "actor_id": "actor-traveler",
                "intent": "Ask for directions",
                "priority": "high",
                "metadata": { "actor_name": "Traveler" }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["action_type"], "custom");
    assert_eq!(json["priority"], "high");
    assert_eq!(json["status"], "pending");
    assert!(json["id"].as_str().unwrap().starts_with("act-"));

    let actor = runtime
        .store()
        .actors()
        .get("actor-traveler")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(actor.name, "Traveler");

    let (status, _) = send(
        &router,
        post_json(
            &format!("/api/simulations/{id}/actions"),
            &json!({ "actor_id": "actor-traveler", "intent": "" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_add_actor() {
    let runtime = make_runtime("add_actor").await;
    let router = router_for(&runtime);
    let id = create(&router, "Town", 3).await;

    let uri = format!("/api/simulations/{id}/actors");
    let (status, _) = send(&router, post_json(&uri, &json!({ "actor_id": "actor-ghost" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let smith = Actor::new(ActorId::from("actor-smith"), "Smith", ActorType::Npc);
    runtime.store().actors().create(&smith).await.unwrap();

    let (status, json) = send(&router, post_json(&uri, &json!({ "actor_id": "actor-smith" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["actor_count"], 1);

    let (_, json) = send(&router, post_json(&uri, &json!({ "actor_id": "actor-smith" }))).await;
    assert_eq!(json["actor_count"], 1);
}

#[tokio::test]
async fn test_actor_crud() {
    let runtime = make_runtime("actor_crud").await;
    let router = router_for(&runtime);

    let (status, _) = send(
        &router,
        post_json("/api/actors", &json!({ "name": "", "type": "npc" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, created) = send(
        &router,
        post_json(
            "/api/actors",
            &json!({ "name": "Smith", "type": "npc", "attributes": { "trade": "forge" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_owned();
    assert!(id.starts_with("actor-"));
    assert_eq!(created["type"], "npc");
    assert_eq!(created["active"], true);

    let (status, listed) = send(
        &router,
        Request::get("/api/actors").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["actors"][0]["id"], id.as_str());
    assert_eq!(listed["actors"][0]["name"], "Smith");
    assert!(listed["actors"][0]["last_updated"].is_string());

    let uri = format!("/api/actors/{id}");
    let (status, updated) = send(
        &router,
        Request::put(uri.as_str())
            .header("content-type", "application/json")
            .body(Body::from(json!({ "name": "Master Smith", "active": false }).to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Master Smith");
    assert_eq!(updated["active"], false);
    assert_eq!(updated["attributes"]["trade"], "forge");

    let (status, fetched) = send(&router, Request::get(uri.as_str()).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Master Smith");

    let deleted = router
        .clone()
        .oneshot(Request::delete(uri.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let (status, json) = send(&router, Request::get(uri.as_str()).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);
}

// =========================================================================
// Scenarios and gateway
// =========================================================================

#[tokio::test]
async fn test_list_scenarios() {
    let runtime = make_runtime("scenarios").await;
    let router = router_for(&runtime);

    let (status, json) = send(
        &router,
        Request::get("/api/scenarios").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
    assert_eq!(json["default"], "simple_town");
    assert_eq!(json["scenarios"][0]["key"], "simple_town");
    assert!(json["scenarios"][0]["description"].is_string());
}

#[tokio::test]
async fn test_llm_check() {
    let runtime = make_runtime("llm_none").await;
    let (status, json) = send(&router_for(&runtime), post_empty("/api/llm/check")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["available"], false);
    assert_eq!(json["ready"], false);
    assert_eq!(json["providers"], json!([]));

    let gateway =
        Gateway::scripted(ScriptedBackend::always(ScriptedReply::content("ok"))).unwrap();
    let runtime = make_runtime_with("llm_ready", Some(gateway)).await;
    let (status, json) = send(&router_for(&runtime), post_empty("/api/llm/check")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["available"], true);
    assert_eq!(json["ready"], true);
    assert_eq!(json["providers"], json!(["scripted"]));
    assert_eq!(json["detail"], Value::Null);
}

// =========================================================================
// Stream
// =========================================================================

#[tokio::test]
async fn test_stream_sends_snapshot_then_events_then_heartbeat() {
    let runtime = make_runtime("stream").await;
    let router = router_for(&runtime);
    let id = create(&router, "Town", 3).await;

    let response = router
        .clone()
        .oneshot(
            Request::get(format!("/api/simulations/{id}/stream"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    assert!(content_type.contains("text/event-stream"));

    let mut body = response.into_body().into_data_stream();

    let snapshot = next_frame(&mut body).await;
    assert!(snapshot.contains("event: simulation.snapshot"));
    assert!(snapshot.contains(&id));

    send(&router, post_empty(&format!("/api/simulations/{id}/step"))).await;
    let started = next_frame(&mut body).await;
    assert!(started.contains("event: simulation.started"));
    assert!(started.contains("\"executed_phase\":\"initialize\""));

    let heartbeat = next_frame(&mut body).await;
    assert!(heartbeat.contains("event: heartbeat"));
}

#[tokio::test]
async fn test_stream_ends_when_queues_close() {
    let runtime = make_runtime("stream_close").await;
    let router = router_for(&runtime);
    let id = create(&router, "Town", 3).await;

    let response = router
        .clone()
        .oneshot(
            Request::get(format!("/api/simulations/{id}/stream"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let mut body = response.into_body().into_data_stream();
    next_frame(&mut body).await;

    runtime.hub().close_all();
    assert!(body.next().await.is_none());
}

#[tokio::test]
async fn test_stream_unknown_simulation() {
    let runtime = make_runtime("stream_missing").await;
    let router = router_for(&runtime);

    let (status, _) = send(
        &router,
        Request::get("/api/simulations/sim-00000000/stream")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stream_disconnect_releases_queue() {
    let runtime = make_runtime("stream_drop").await;
    let router = router_for(&runtime);
    let id = create(&router, "Town", 3).await;

    let response = router
        .clone()
        .oneshot(
            Request::get(format!("/api/simulations/{id}/stream"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let simulation_id = SimulationId::from(id.as_str());
    assert_eq!(runtime.hub().subscriber_count(&simulation_id), 1);

    drop(response);
    assert_eq!(runtime.hub().subscriber_count(&simulation_id), 0);
}
