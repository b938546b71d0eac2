//! Observer API server for Chronicle simulations.
//!
//! This crate provides an Axum HTTP server over a [`Runtime`] that exposes:
//!
//! - **REST endpoints** under `/api/simulations` for creating, inspecting,
//!   deleting, and driving simulations (step, cycle, pause, resume), and
//!   for injecting actions and registering actors
//! - **Maintenance endpoints** for standalone actor records
//!   (`/api/actors`), the scenario list (`/api/scenarios`), the gateway
//!   readiness check (`/api/llm/check`), and clearing the store
//! - **Server-sent event stream** (`/api/simulations/{id}/stream`) that
//!   delivers a snapshot frame, then every notification the simulation
//!   publishes, with a heartbeat while idle
//!
//! # Architecture
//!
//! Every handler calls straight into the shared [`Runtime`]; the runtime
//! owns locking, persistence, and notification fan-out. Stream clients
//! hold a bounded subscriber queue that is released when the client
//! disconnects.
//!
//! [`Runtime`]: chronicle_core::Runtime

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod stream;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
