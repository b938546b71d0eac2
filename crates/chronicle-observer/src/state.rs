//! Shared application state for the Observer API server.

use std::sync::Arc;
use std::time::Duration;

use chronicle_core::Runtime;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    runtime: Arc<Runtime>,
    heartbeat: Duration,
}

impl AppState {
    /// Serve `runtime`, sending stream heartbeats at its configured
    /// interval.
    pub fn new(runtime: Arc<Runtime>) -> Self {
        let heartbeat = runtime.heartbeat_interval();
        Self { runtime, heartbeat }
    }

    /// Override the idle interval after which stream clients receive a
    /// heartbeat.
    #[must_use]
    pub const fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// The runtime behind every endpoint.
    pub const fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Idle interval between stream heartbeats.
    pub const fn heartbeat(&self) -> Duration {
        self.heartbeat
    }
}
