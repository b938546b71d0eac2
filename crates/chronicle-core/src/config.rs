//! Configuration loading and typed config structures for Chronicle.
//!
//! The canonical configuration lives in `chronicle-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure, and
//! provides a loader that reads the file and applies environment overrides.
//! Generative-text provider settings are read from the environment by
//! `chronicle-gateway` and are not part of this file.

use std::path::{Path, PathBuf};

use chronicle_store::BackendConfig;
use chronicle_types::{DEFAULT_MAX_CYCLES, DEFAULT_SCENARIO};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level Chronicle configuration.
///
/// Mirrors the structure of `chronicle-config.yaml`. Every section and
/// field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChronicleConfig {
    /// Phase coordinator behaviour.
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Entity Store backend selection.
    #[serde(default)]
    pub store: StoreConfig,

    /// Subscriber queue sizing and heartbeat.
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// HTTP observer bind address.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ChronicleConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `CHRONICLE_STORE_PATH` overrides `store.path`
    /// - `CHRONICLE_STORE_URL` overrides `store.url`
    /// - `CHRONICLE_OBSERVER_PORT` overrides `observer.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string, without environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply `CHRONICLE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CHRONICLE_STORE_PATH") {
            self.store.path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("CHRONICLE_STORE_URL") {
            self.store.url = val;
        }
        if let Some(port) = std::env::var("CHRONICLE_OBSERVER_PORT")
            .ok()
            .and_then(|val| val.trim().parse().ok())
        {
            self.observer.port = port;
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Phase coordinator behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CoordinatorConfig {
    /// Reject steps whose phase differs from the recorded phase.
    #[serde(default = "default_true")]
    pub enforce_phase_sequence: bool,

    /// Append handler notes to the simulation's phase log.
    #[serde(default = "default_true")]
    pub persist_phase_notes: bool,

    /// Cycle limit for simulations created without one.
    #[serde(default = "default_max_cycles")]
    pub default_max_cycles: u64,

    /// Scenario for simulations created without one, and the fallback for
    /// unknown scenario keys.
    #[serde(default = "default_scenario")]
    pub default_scenario: String,

    /// Snapshots kept in simulation metadata. Unbounded when absent.
    #[serde(default)]
    pub snapshot_history_limit: Option<usize>,
}

const fn default_true() -> bool {
    true
}

const fn default_max_cycles() -> u64 {
    DEFAULT_MAX_CYCLES
}

fn default_scenario() -> String {
    DEFAULT_SCENARIO.to_owned()
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            enforce_phase_sequence: true,
            persist_phase_notes: true,
            default_max_cycles: default_max_cycles(),
            default_scenario: default_scenario(),
            snapshot_history_limit: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Which Entity Store backend to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Single JSON file on local disk.
    #[default]
    Local,
    /// Dragonfly document store.
    Remote,
}

/// Entity Store backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Active backend.
    #[serde(default)]
    pub backend: StoreKind,

    /// Local backend file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Remote backend connection URL.
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Remote backend key prefix.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".chronicle/state.json")
}

fn default_store_url() -> String {
    "redis://localhost:6379".to_owned()
}

fn default_namespace() -> String {
    "chronicle".to_owned()
}

impl StoreConfig {
    /// The backend description for [`chronicle_store::EntityStore::open`].
    pub fn backend_config(&self) -> BackendConfig {
        match self.backend {
            StoreKind::Local => BackendConfig::Local {
                path: self.path.clone(),
            },
            StoreKind::Remote => BackendConfig::Remote {
                url: self.url.clone(),
                namespace: self.namespace.clone(),
            },
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreKind::Local,
            path: default_store_path(),
            url: default_store_url(),
            namespace: default_namespace(),
        }
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Subscriber queue sizing and heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotificationsConfig {
    /// Items each subscriber queue holds before dropping the oldest.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Seconds of idleness before a heartbeat is sent to a subscriber.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

const fn default_queue_capacity() -> usize {
    32
}

const fn default_heartbeat_secs() -> u64 {
    15
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// HTTP observer bind address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable, coloured output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ChronicleConfig::default();
        assert!(config.coordinator.enforce_phase_sequence);
        assert!(config.coordinator.persist_phase_notes);
        assert_eq!(config.coordinator.default_max_cycles, 20);
        assert_eq!(config.coordinator.default_scenario, "simple_town");
        assert_eq!(config.coordinator.snapshot_history_limit, None);
        assert_eq!(config.notifications.queue_capacity, 32);
        assert_eq!(config.notifications.heartbeat_secs, 15);
        assert_eq!(config.observer.port, 8080);
        assert_eq!(config.store.backend, StoreKind::Local);
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let shipped = ChronicleConfig::parse(include_str!("../../../chronicle-config.yaml")).unwrap();
        assert_eq!(shipped, ChronicleConfig::default());
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(ChronicleConfig::parse("").unwrap(), ChronicleConfig::default());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
coordinator:
  enforce_phase_sequence: false
  persist_phase_notes: false
  default_max_cycles: 5
  default_scenario: harbor
  snapshot_history_limit: 10

store:
  backend: remote
  url: "redis://dragonfly:6379"
  namespace: test

notifications:
  queue_capacity: 8
  heartbeat_secs: 5

observer:
  host: "127.0.0.1"
  port: 9090

logging:
  format: json
  level: debug
"#;
        let config = ChronicleConfig::parse(yaml).unwrap();
        assert!(!config.coordinator.enforce_phase_sequence);
        assert_eq!(config.coordinator.snapshot_history_limit, Some(10));
        assert_eq!(config.notifications.queue_capacity, 8);
        assert_eq!(config.observer.port, 9090);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.store.backend_config(),
            BackendConfig::Remote {
                url: "redis://dragonfly:6379".to_owned(),
                namespace: "test".to_owned(),
            }
        );
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let config = ChronicleConfig::parse("store:\n  path: /tmp/chronicle.json\n").unwrap();
        assert_eq!(config.store.path, PathBuf::from("/tmp/chronicle.json"));
        assert_eq!(config.store.namespace, "chronicle");
        assert_eq!(config.coordinator, CoordinatorConfig::default());
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let result = ChronicleConfig::parse("coordinator: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }
}
