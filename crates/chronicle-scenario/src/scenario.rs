//! The [`Scenario`] contract.

use crate::context::ScenarioContext;

/// A named generator of initial simulation content.
///
/// `seed` runs once per simulation, on its first event-generation phase.
/// The hooks run on every event-generation phase (`before_phase`,
/// `after_phase`) and snapshot (`on_snapshot`); they may add entities to the
/// context, which the coordinator then persists.
pub trait Scenario: Send + Sync {
    /// Registry key, e.g. `simple_town`.
    fn key(&self) -> &'static str;

    /// One-line description for listings.
    fn description(&self) -> &'static str;

    /// Populate the initial actors, events, and actions.
    fn seed(&self, context: &mut ScenarioContext);

    /// Runs before new entities from an event-generation phase are persisted.
    fn before_phase(&self, _context: &mut ScenarioContext) {}

    /// Runs after an event-generation phase has persisted its entities.
    fn after_phase(&self, _context: &mut ScenarioContext) {}

    /// Runs when the snapshot phase records a summary.
    fn on_snapshot(&self, _context: &mut ScenarioContext) {}
}
