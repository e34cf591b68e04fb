//! Live notification fan-out for computation state events.
//!
//! Subscribers register with an optional correlation filter and receive
//! every matching event committed while their connection is open. There
//! is no backfill: a subscriber that connects after a transition will not
//! see it and should read the current state first.

use relay_core::StateEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

struct SubscriberEntry {
    filter: Option<Uuid>,
    tx: mpsc::UnboundedSender<StateEvent>,
}

type SubscriberMap = Arc<Mutex<HashMap<u64, SubscriberEntry>>>;

/// Fan-out hub for committed state events.
pub struct NotificationHub {
    subscribers: SubscriberMap,
    next_id: AtomicU64,
    heartbeat_interval: Duration,
}

impl NotificationHub {
    pub fn new(heartbeat_interval: Duration) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            heartbeat_interval,
        }
    }

    /// Register a subscriber. With a filter, only events for that
    /// correlation id are delivered; without one, all events are.
    pub fn subscribe(&self, filter: Option<Uuid>) -> EventSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .expect("subscriber map poisoned")
            .insert(id, SubscriberEntry { filter, tx });

        EventSubscription {
            id,
            rx,
            subscribers: Arc::clone(&self.subscribers),
            heartbeat: tokio::time::interval(self.heartbeat_interval),
        }
    }

    /// Deliver an event to all matching subscribers.
    ///
    /// Sends are unbounded and never block, so this is safe to call while
    /// the lifecycle commit lock is held. Subscribers whose receiving side
    /// is gone are dropped here.
    pub fn publish(&self, event: &StateEvent) {
        let mut subscribers = self.subscribers.lock().expect("subscriber map poisoned");
        subscribers.retain(|_, entry| {
            let matches = entry
                .filter
                .map_or(true, |filter| filter == event.correlation_id);
            if !matches {
                return true;
            }
            entry.tx.send(event.clone()).is_ok()
        });
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber map poisoned")
            .len()
    }
}

/// What a subscription yields next.
#[derive(Debug)]
pub enum SubscriptionMessage {
    Event(StateEvent),
    /// Emitted at the configured interval so idle connections stay alive.
    Heartbeat,
}

/// A registered subscriber handle. Deregisters itself on drop.
pub struct EventSubscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<StateEvent>,
    subscribers: SubscriberMap,
    heartbeat: tokio::time::Interval,
}

impl EventSubscription {
    /// Wait for the next event or heartbeat tick.
    ///
    /// Returns `None` when the hub is gone and all pending events have
    /// been consumed.
    pub async fn next(&mut self) -> Option<SubscriptionMessage> {
        tokio::select! {
            biased;
            event = self.rx.recv() => event.map(SubscriptionMessage::Event),
            _ = self.heartbeat.tick() => Some(SubscriptionMessage::Heartbeat),
        }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.remove(&self.id);
        }
    }
}
