//! Axum router construction for the Observer API.
//!
//! Assembles all routes (REST + server-sent events) into a single
//! [`Router`] with CORS middleware enabled for cross-origin dashboard
//! access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::stream;

/// Build the complete Axum router for the Observer server.
///
/// CORS is configured to allow any origin for development. In
/// production this should be restricted.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/simulations",
            get(handlers::list_simulations)
                .post(handlers::create_simulation)
                .delete(handlers::clear_simulations),
        )
        .route(
            "/api/simulations/{id}",
            get(handlers::get_simulation).delete(handlers::delete_simulation),
        )
        .route("/api/simulations/{id}/step", post(handlers::step_simulation))
        .route("/api/simulations/{id}/cycle", post(handlers::run_cycle))
        .route("/api/simulations/{id}/pause", post(handlers::pause_simulation))
        .route("/api/simulations/{id}/resume", post(handlers::resume_simulation))
        .route("/api/simulations/{id}/actions", post(handlers::inject_action))
        .route("/api/simulations/{id}/actors", post(handlers::add_actor))
        .route(
            "/api/actors",
            get(handlers::list_actors).post(handlers::create_actor),
        )
        .route(
            "/api/actors/{id}",
            get(handlers::get_actor)
                .put(handlers::update_actor)
                .delete(handlers::delete_actor),
        )
        .route("/api/scenarios", get(handlers::list_scenarios))
        .route("/api/llm/check", post(handlers::check_gateway))
        // Server-sent events
        .route("/api/simulations/{id}/stream", get(stream::stream_simulation))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
