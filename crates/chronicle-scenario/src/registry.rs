//! Lookup of scenarios by normalised key.

use std::collections::BTreeMap;
use std::sync::Arc;

use chronicle_types::{DEFAULT_SCENARIO, Simulation};
use tracing::warn;

use crate::context::ScenarioContext;
use crate::error::ScenarioError;
use crate::scenario::Scenario;
use crate::simple_town::SimpleTown;

/// Trim and lowercase a scenario key.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Registered scenarios, keyed by normalised key.
///
/// Unknown keys resolve to the default scenario (with a warning) so a
/// simulation created with a typo still runs.
pub struct ScenarioRegistry {
    scenarios: BTreeMap<String, Arc<dyn Scenario>>,
    default_key: String,
}

impl ScenarioRegistry {
    /// An empty registry falling back to `default_key`.
    pub fn new(default_key: &str) -> Self {
        Self {
            scenarios: BTreeMap::new(),
            default_key: normalize_key(default_key),
        }
    }

    /// A registry holding the built-in scenarios, defaulting to
    /// `simple_town`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new(DEFAULT_SCENARIO);
        registry.scenarios.insert(
            normalize_key(SimpleTown.key()),
            Arc::new(SimpleTown),
        );
        registry
    }

    /// Change the fallback scenario key.
    #[must_use]
    pub fn with_default(mut self, key: &str) -> Self {
        self.default_key = normalize_key(key);
        self
    }

    /// Register `scenario` under its own key.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::DuplicateScenario`] if the key is taken.
    pub fn register(&mut self, scenario: Arc<dyn Scenario>) -> Result<(), ScenarioError> {
        let key = scenario.key();
        self.register_as(key, scenario)
    }

    /// Register `scenario` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::DuplicateScenario`] if the key is taken.
    pub fn register_as(
        &mut self,
        key: &str,
        scenario: Arc<dyn Scenario>,
    ) -> Result<(), ScenarioError> {
        let key = normalize_key(key);
        if self.scenarios.contains_key(&key) {
            return Err(ScenarioError::DuplicateScenario { key });
        }
        self.scenarios.insert(key, scenario);
        Ok(())
    }

    /// Remove a scenario. Returns `false` if it was not registered.
    pub fn unregister(&mut self, key: &str) -> bool {
        self.scenarios.remove(&normalize_key(key)).is_some()
    }

    /// The scenario registered under `key`, without fallback.
    pub fn get(&self, key: &str) -> Option<Arc<dyn Scenario>> {
        self.scenarios.get(&normalize_key(key)).cloned()
    }

    /// The scenario for `key`, falling back to the default.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::UnknownScenario`] if neither `key` nor the
    /// default is registered.
    pub fn select(&self, key: &str) -> Result<Arc<dyn Scenario>, ScenarioError> {
        if let Some(scenario) = self.get(key) {
            return Ok(scenario);
        }
        let fallback = self
            .scenarios
            .get(&self.default_key)
            .cloned()
            .ok_or_else(|| ScenarioError::UnknownScenario {
                key: normalize_key(key),
            })?;
        warn!(
            requested = key,
            default = %self.default_key,
            "unknown scenario, using default"
        );
        Ok(fallback)
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        self.scenarios.keys().map(String::as_str).collect()
    }

    /// `(key, description)` for every registered scenario.
    pub fn describe(&self) -> Vec<(&str, &'static str)> {
        self.scenarios
            .iter()
            .map(|(key, scenario)| (key.as_str(), scenario.description()))
            .collect()
    }

    /// Run the scenario for `key` against a fresh context.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::UnknownScenario`] if no scenario resolves.
    pub fn seed(&self, key: &str, simulation: Simulation) -> Result<ScenarioContext, ScenarioError> {
        let scenario = self.select(key)?;
        let mut context = ScenarioContext::new(simulation);
        scenario.seed(&mut context);
        Ok(context)
    }
}

impl Default for ScenarioRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
