//! Phase coordinator and runtime for the Chronicle simulation.
//!
//! A simulation advances one phase per [`Coordinator::step`]:
//!
//! ```text
//! initialize -> event_generation -> action_collection
//!            -> action_resolution -> world_update -> snapshot
//!                     ^                                 |
//!                     +---------------------------------+
//! ```
//!
//! `paused` and `completed` sit outside the cycle. Reaching `max_cycles`
//! at a snapshot completes the simulation.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides
//! - [`coordinator`] -- [`Coordinator`]: `step` and `run_cycle`
//! - [`phase`] -- Handler registry, [`PhaseContext`], [`PhaseResult`]
//! - [`handlers`] -- The six phase handlers
//! - [`locks`] -- Per-simulation lock table
//! - [`notify`] -- Bounded drop-oldest subscriber queues
//! - [`runtime`] -- [`Runtime`]: lifecycle and operations outside the cycle
//! - [`summary`] -- [`SimulationSummary`]
//! - [`error`] -- [`CoordinatorError`], [`RuntimeError`]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod locks;
pub mod notify;
pub mod phase;
pub mod runtime;
pub mod summary;

pub use config::{ChronicleConfig, ConfigError, CoordinatorConfig, LogFormat};
pub use coordinator::Coordinator;
pub use error::{CoordinatorError, RuntimeError};
pub use locks::LockTable;
pub use notify::{NotificationHub, Received, StreamEvent, SubscriberQueue, Subscription, events};
pub use phase::{PhaseContext, PhaseHandler, PhaseRegistry, PhaseReport, PhaseResult};
pub use runtime::{
    ActionRequest, ActorUpdate, ClearReport, GatewayStatus, NewActor, NewSimulation, Runtime,
};
pub use summary::SimulationSummary;
