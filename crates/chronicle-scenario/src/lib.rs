//! Scenario seeding for the Chronicle simulation coordinator.
//!
//! A scenario populates a new simulation with its first actors, events, and
//! actions, and may react to later phases through hooks. The coordinator
//! consults the [`ScenarioRegistry`] on a simulation's first
//! event-generation phase.
//!
//! # Modules
//!
//! - [`scenario`] -- The [`Scenario`] trait and its hooks
//! - [`context`] -- [`ScenarioContext`], the working set scenarios mutate
//! - [`registry`] -- [`ScenarioRegistry`] with normalised keys and fallback
//! - [`simple_town`] -- The built-in [`SimpleTown`] scenario
//! - [`error`] -- [`ScenarioError`]

pub mod context;
pub mod error;
pub mod registry;
pub mod scenario;
pub mod simple_town;

pub use context::ScenarioContext;
pub use error::ScenarioError;
pub use registry::{ScenarioRegistry, normalize_key};
pub use scenario::Scenario;
pub use simple_town::SimpleTown;
