//! Process-wide event bus.
//!
//! Every spawner invocation and the serial session publish tagged
//! `StreamEvent`s here. Subscribers that fall behind by more than the
//! channel capacity lose the oldest events (`RecvError::Lagged`).

use espbridge_core::StreamEvent;
use espbridge_core::settings::DEFAULT_EVENT_CAPACITY;
use std::sync::{Arc, LazyLock};
use tokio::sync::broadcast;
use tracing::debug;

use crate::env::settings_from_env;

/// Global event bus, sized from `ESPBRIDGE_EVENT_CAPACITY` on first use.
static EVENT_BUS: LazyLock<Arc<EventBus>> = LazyLock::new(|| {
    Arc::new(EventBus::with_capacity(
        settings_from_env("event bus").event_capacity,
    ))
});

/// Get the global event bus.
pub fn get_event_bus() -> Arc<EventBus> {
    EVENT_BUS.clone()
}

/// Broadcaster for spawner and serial events.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<StreamEvent>,
}

impl EventBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a bus holding up to `capacity` undelivered events per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Events published while nobody listens are dropped.
    pub fn publish(&self, event: impl Into<StreamEvent>) {
        let event = event.into();
        if self.sender.receiver_count() > 0 {
            debug!(?event, "Publishing stream event");
            let _ = self.sender.send(event);
        }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
