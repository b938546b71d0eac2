//! Server-sent event stream of simulation notifications.
//!
//! Clients connect to `GET /api/simulations/{id}/stream` and receive:
//!
//! 1. a `simulation.snapshot` frame describing the current state,
//! 2. every notification the simulation publishes, in order,
//! 3. a `heartbeat` frame whenever nothing arrives for the configured
//!    interval.
//!
//! Each client owns a bounded subscriber queue. A slow client loses the
//! oldest queued notifications rather than stalling the coordinator. The
//! queue is released when the client disconnects and the response body is
//! dropped.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::response::sse::{Event, Sse};
use chronicle_core::{Received, StreamEvent, Subscription};
use chronicle_types::SimulationId;
use futures::stream::{self, Stream};
use tracing::{debug, warn};

use crate::error::ObserverError;
use crate::state::AppState;

/// Where a client's stream currently stands.
struct StreamState {
    initial: Option<StreamEvent>,
    subscription: Subscription,
    heartbeat: Duration,
}

/// Open a notification stream for one simulation.
///
/// # Route
///
/// `GET /api/simulations/{id}/stream`
pub async fn stream_simulation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let simulation_id = SimulationId::from(id);
    let (subscription, initial) = state.runtime().subscribe(&simulation_id).await?;
    debug!(
        simulation_id = %simulation_id,
        queue = subscription.queue().id(),
        "stream client connected"
    );
    Ok(Sse::new(frames(subscription, initial, state.heartbeat())))
}

/// The frames delivered to one client. Ends when the queue is closed.
fn frames(
    subscription: Subscription,
    initial: StreamEvent,
    heartbeat: Duration,
) -> impl Stream<Item = Result<Event, axum::Error>> {
    let state = StreamState {
        initial: Some(initial),
        subscription,
        heartbeat,
    };
    stream::unfold(state, |mut state| async move {
        let next = match state.initial.take() {
            Some(initial) => initial,
            None => match state.subscription.queue().recv_timeout(state.heartbeat).await {
                Received::Event(event) => *event,
                Received::Idle => StreamEvent::heartbeat(state.subscription.simulation_id()),
                Received::Closed => {
                    debug!(
                        simulation_id = %state.subscription.simulation_id(),
                        "subscriber queue closed, ending stream"
                    );
                    return None;
                }
            },
        };
        Some((to_frame(&next), state))
    })
}

fn to_frame(event: &StreamEvent) -> Result<Event, axum::Error> {
    Event::default()
        .event(event.event.as_str())
        .json_data(event)
        .inspect_err(|e| warn!(event = %event.event, error = %e, "failed to encode stream frame"))
}
