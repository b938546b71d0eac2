//! Shared type definitions for the Chronicle simulation coordinator.
//!
//! This crate is the single source of truth for the entities the phase
//! coordinator reads and writes. Types flow downstream to `TypeScript` via
//! `ts-rs` for dashboards that consume the notification stream.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe string identifiers for every entity kind
//! - [`enums`] -- Status, phase, and category enumerations
//! - [`entities`] -- [`Simulation`], [`Actor`], [`Event`], [`Action`]
//! - [`metadata`] -- Structured simulation metadata (phase log, snapshots)

pub mod entities;
pub mod enums;
pub mod ids;
pub mod metadata;

// Re-export all public types at crate root for convenience.
pub use entities::{
    Action, Actor, ActorEffects, DEFAULT_MAX_CYCLES, DEFAULT_SCENARIO, Event, FieldMap, Simulation,
};
pub use enums::{
    ActionPriority, ActionStatus, ActionType, ActorType, EventStatus, EventType, Phase,
    SimulationStatus, UnknownVariant,
};
pub use ids::{ActionId, ActorId, EventId, SimulationId};
pub use metadata::{PhaseLogEntry, ScenarioMarker, SimulationMetadata, SnapshotRecord};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // ts-rs writes the files to `bindings/` relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::SimulationId::export_all();
        let _ = crate::ids::ActorId::export_all();
        let _ = crate::ids::EventId::export_all();
        let _ = crate::ids::ActionId::export_all();

        // Enums
        let _ = crate::enums::SimulationStatus::export_all();
        let _ = crate::enums::Phase::export_all();
        let _ = crate::enums::ActorType::export_all();
        let _ = crate::enums::EventType::export_all();
        let _ = crate::enums::EventStatus::export_all();
        let _ = crate::enums::ActionType::export_all();
        let _ = crate::enums::ActionPriority::export_all();
        let _ = crate::enums::ActionStatus::export_all();

        // Structs
        let _ = crate::metadata::PhaseLogEntry::export_all();
        let _ = crate::metadata::ScenarioMarker::export_all();
        let _ = crate::metadata::SnapshotRecord::export_all();
        let _ = crate::metadata::SimulationMetadata::export_all();
        let _ = crate::entities::ActorEffects::export_all();
        let _ = crate::entities::Simulation::export_all();
        let _ = crate::entities::Actor::export_all();
        let _ = crate::entities::Event::export_all();
        let _ = crate::entities::Action::export_all();
    }
}
