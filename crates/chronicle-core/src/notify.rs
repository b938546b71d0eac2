//! Notification fan-out to simulation observers.
//!
//! Each subscriber owns a bounded queue. Publishing never blocks: when a
//! queue is full its oldest item is evicted to make room, so a slow consumer
//! sees at most the `capacity` most recent events. All subscriber-set
//! mutations and the publish fan-out happen under one hub-wide lock.
//!
//! Queues are per subscriber rather than one shared broadcast channel: a
//! lagging subscriber loses only its own oldest items, never sees a lag
//! error, and can be closed on its own.
//!
//! Consumers wait with [`SubscriberQueue::recv_timeout`] and emit a
//! heartbeat whenever the wait times out.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chronicle_types::{FieldMap, Simulation, SimulationId};
use serde::Serialize;
use tokio::sync::Notify;
use tracing::debug;

use crate::phase::PhaseReport;
use crate::summary::SimulationSummary;

/// Default number of items a subscriber queue holds.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Notification event names.
pub mod events {
    /// A simulation was created.
    pub const CREATED: &str = "simulation.created";
    /// The initialize phase moved a simulation to `running`.
    pub const STARTED: &str = "simulation.started";
    /// A phase executed.
    pub const PHASE_ADVANCED: &str = "simulation.phase_advanced";
    /// A simulation was paused.
    pub const PAUSED: &str = "simulation.paused";
    /// A simulation was resumed.
    pub const RESUMED: &str = "simulation.resumed";
    /// A simulation reached its cycle limit.
    pub const COMPLETED: &str = "simulation.completed";
    /// A simulation was deleted.
    pub const DELETED: &str = "simulation.deleted";
    /// An action was injected.
    pub const ACTION_ADDED: &str = "simulation.action_added";
    /// An actor was registered.
    pub const ACTOR_ADDED: &str = "simulation.actor_added";
    /// Initial state frame sent to a new subscriber.
    pub const SNAPSHOT: &str = "simulation.snapshot";
    /// Idle keep-alive.
    pub const HEARTBEAT: &str = "heartbeat";
}

// ---------------------------------------------------------------------------
// StreamEvent
// ---------------------------------------------------------------------------

/// One notification delivered to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    /// Event name, one of [`events`].
    pub event: String,
    /// The simulation the event concerns.
    pub simulation_id: SimulationId,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
    /// Simulation state after the change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SimulationSummary>,
    /// The phase result, for phase transitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_result: Option<PhaseReport>,
    /// Event-specific extra fields.
    #[serde(skip_serializing_if = "FieldMap::is_empty")]
    pub metadata: FieldMap,
}

impl StreamEvent {
    /// An event carrying the simulation's current summary.
    pub fn for_simulation(event: &str, simulation: &Simulation) -> Self {
        Self {
            event: event.to_owned(),
            simulation_id: simulation.id.clone(),
            timestamp: Utc::now(),
            summary: Some(SimulationSummary::from(simulation)),
            phase_result: None,
            metadata: FieldMap::new(),
        }
    }

    /// An idle keep-alive for `simulation_id`.
    pub fn heartbeat(simulation_id: &SimulationId) -> Self {
        Self {
            event: events::HEARTBEAT.to_owned(),
            simulation_id: simulation_id.clone(),
            timestamp: Utc::now(),
            summary: None,
            phase_result: None,
            metadata: FieldMap::new(),
        }
    }

    /// Attach a phase report.
    #[must_use]
    pub fn with_phase_result(mut self, report: PhaseReport) -> Self {
        self.phase_result = Some(report);
        self
    }

    /// Attach one metadata field.
    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_owned(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// SubscriberQueue
// ---------------------------------------------------------------------------

/// Outcome of a timed wait on a subscriber queue.
#[derive(Debug, Clone)]
pub enum Received {
    /// An event arrived.
    Event(Box<StreamEvent>),
    /// Nothing arrived before the timeout; send a heartbeat.
    Idle,
    /// The queue was closed and drained.
    Closed,
}

/// A bounded, drop-oldest queue owned by one subscriber.
#[derive(Debug)]
pub struct SubscriberQueue {
    id: u64,
    capacity: usize,
    items: Mutex<VecDeque<StreamEvent>>,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl SubscriberQueue {
    fn new(id: u64, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            id,
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Hub-assigned identifier.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Maximum items held.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items currently queued.
    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items evicted because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Enqueue, evicting the oldest item when full. Returns `true` if an
    /// item was evicted.
    fn push(&self, event: StreamEvent) -> bool {
        let evicted = {
            let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
            let evicted = if items.len() >= self.capacity {
                items.pop_front().is_some()
            } else {
                false
            };
            items.push_back(event);
            evicted
        };
        if evicted {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.notify.notify_one();
        evicted
    }

    /// Take the oldest queued event without waiting.
    pub fn try_recv(&self) -> Option<StreamEvent> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
    }

    /// Wait for the next event. Returns `None` once closed and drained.
    pub async fn recv(&self) -> Option<StreamEvent> {
        loop {
            if let Some(event) = self.try_recv() {
                return Some(event);
            }
            if self.is_closed() {
                return None;
            }
            self.notify.notified().await;
        }
    }

    /// Wait up to `timeout` for the next event.
    pub async fn recv_timeout(&self, timeout: Duration) -> Received {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(Some(event)) => Received::Event(Box::new(event)),
            Ok(None) => Received::Closed,
            Err(_) => Received::Idle,
        }
    }

    /// Stop accepting events and wake the consumer.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

// ---------------------------------------------------------------------------
// NotificationHub
// ---------------------------------------------------------------------------

/// Per-simulation sets of subscriber queues.
#[derive(Debug)]
pub struct NotificationHub {
    capacity: usize,
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SimulationId, Vec<Arc<SubscriberQueue>>>>,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl NotificationHub {
    /// Create a hub whose queues hold `capacity` items each.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new queue for `simulation_id`.
    pub fn subscribe(&self, simulation_id: &SimulationId) -> Arc<SubscriberQueue> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::new(SubscriberQueue::new(id, self.capacity));
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(simulation_id.clone())
            .or_default()
            .push(Arc::clone(&queue));
        debug!(simulation_id = %simulation_id, subscriber = id, "subscriber registered");
        queue
    }

    /// Register a queue that unsubscribes itself when dropped.
    pub fn subscribe_guarded(self: &Arc<Self>, simulation_id: &SimulationId) -> Subscription {
        Subscription {
            hub: Arc::clone(self),
            simulation_id: simulation_id.clone(),
            queue: self.subscribe(simulation_id),
        }
    }

    /// Remove and close `queue`. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, simulation_id: &SimulationId, queue: &Arc<SubscriberQueue>) -> bool {
        queue.close();
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(queues) = subscribers.get_mut(simulation_id) else {
            return false;
        };
        let before = queues.len();
        queues.retain(|q| !Arc::ptr_eq(q, queue));
        let removed = queues.len() != before;
        if queues.is_empty() {
            subscribers.remove(simulation_id);
        }
        if removed {
            debug!(simulation_id = %simulation_id, subscriber = queue.id(), "subscriber removed");
        }
        removed
    }

    /// Deliver `event` to every subscriber of its simulation. Returns the
    /// number of queues it reached.
    pub fn publish(&self, event: &StreamEvent) -> usize {
        let subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(queues) = subscribers.get(&event.simulation_id) else {
            return 0;
        };
        let mut evicted = 0_usize;
        for queue in queues {
            if queue.push(event.clone()) {
                evicted = evicted.saturating_add(1);
            }
        }
        debug!(
            simulation_id = %event.simulation_id,
            event = %event.event,
            subscribers = queues.len(),
            evicted,
            "notification published"
        );
        queues.len()
    }

    /// Number of queues registered for `simulation_id`.
    pub fn subscriber_count(&self, simulation_id: &SimulationId) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(simulation_id)
            .map_or(0, Vec::len)
    }

    /// Number of simulations with at least one subscriber.
    pub fn simulation_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Close and forget every queue.
    pub fn close_all(&self) {
        let drained: Vec<_> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for queue in drained.iter().flat_map(|(_, queues)| queues) {
            queue.close();
        }
    }
}

/// A subscription that unsubscribes when dropped.
#[derive(Debug)]
pub struct Subscription {
    hub: Arc<NotificationHub>,
    simulation_id: SimulationId,
    queue: Arc<SubscriberQueue>,
}

impl Subscription {
    /// The subscribed simulation.
    pub const fn simulation_id(&self) -> &SimulationId {
        &self.simulation_id
    }

    /// The underlying queue.
    pub const fn queue(&self) -> &Arc<SubscriberQueue> {
        &self.queue
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(&self.simulation_id, &self.queue);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn event(name: &str, sim: &str) -> StreamEvent {
        StreamEvent::heartbeat(&SimulationId::from(sim)).with_metadata("name", name)
    }

    fn name_of(event: &StreamEvent) -> String {
        event.metadata.get("name").and_then(|v| v.as_str()).unwrap().to_owned()
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let hub = NotificationHub::new(4);
        assert_eq!(hub.publish(&event("a", "sim-x")), 0);
        assert_eq!(hub.simulation_count(), 0);
    }

    #[test]
    fn full_queue_keeps_most_recent() {
        let hub = NotificationHub::new(3);
        let sim = SimulationId::from("sim-x");
        let queue = hub.subscribe(&sim);

        for name in ["e1", "e2", "e3", "e4"] {
            hub.publish(&event(name, "sim-x"));
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped(), 1);
        let names: Vec<_> = std::iter::from_fn(|| queue.try_recv()).map(|e| name_of(&e)).collect();
        assert_eq!(names, ["e2", "e3", "e4"]);
    }

    #[test]
    fn events_reach_only_their_simulation() {
        let hub = NotificationHub::new(4);
        let a = hub.subscribe(&SimulationId::from("sim-a"));
        let b = hub.subscribe(&SimulationId::from("sim-b"));

        assert_eq!(hub.publish(&event("x", "sim-a")), 1);
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
    }

    #[test]
    fn unsubscribe_removes_and_closes() {
        let hub = NotificationHub::new(4);
        let sim = SimulationId::from("sim-x");
        let queue = hub.subscribe(&sim);

        assert!(hub.unsubscribe(&sim, &queue));
        assert!(queue.is_closed());
        assert!(!hub.unsubscribe(&sim, &queue));
        assert_eq!(hub.subscriber_count(&sim), 0);
        assert_eq!(hub.simulation_count(), 0);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let hub = Arc::new(NotificationHub::new(4));
        let sim = SimulationId::from("sim-x");
        let subscription = hub.subscribe_guarded(&sim);
        assert_eq!(hub.subscriber_count(&sim), 1);
        drop(subscription);
        assert_eq!(hub.subscriber_count(&sim), 0);
    }

    #[tokio::test]
    async fn recv_timeout_reports_idle_event_and_closed() {
        let hub = NotificationHub::new(4);
        let sim = SimulationId::from("sim-x");
        let queue = hub.subscribe(&sim);

        assert!(matches!(
            queue.recv_timeout(Duration::from_millis(10)).await,
            Received::Idle
        ));

        hub.publish(&event("e1", "sim-x"));
        let received = queue.recv_timeout(Duration::from_millis(10)).await;
        assert!(matches!(&received, Received::Event(e) if name_of(e) == "e1"));

        hub.close_all();
        assert!(matches!(
            queue.recv_timeout(Duration::from_millis(10)).await,
            Received::Closed
        ));
    }

    #[tokio::test]
    async fn recv_wakes_on_publish() {
        let hub = Arc::new(NotificationHub::new(4));
        let sim = SimulationId::from("sim-x");
        let queue = hub.subscribe(&sim);

        let waiter = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move { queue.recv().await }
        });
        tokio::task::yield_now().await;
        hub.publish(&event("late", "sim-x"));

        let received = waiter.await.unwrap().unwrap();
        assert_eq!(name_of(&received), "late");
    }
}
