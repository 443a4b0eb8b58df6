use crate::types::WebhookEvent;
use chrono::Utc;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const DEFAULT_CAPACITY: usize = 50;

/// Buffer shared between the webhook receiver (sole writer) and the polling
/// endpoint. Lives for the process only; a restart empties it.
pub type SharedEvents = Arc<RwLock<EventBuffer>>;

/// Newest-first, fixed-capacity record of vendor callbacks.
#[derive(Debug)]
pub struct EventBuffer {
    events: VecDeque<WebhookEvent>,
    capacity: usize,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn shared(capacity: usize) -> SharedEvents {
        Arc::new(RwLock::new(Self::new(capacity)))
    }

    /// Prepends an event and evicts from the tail past capacity.
    pub fn record(&mut self, payload: Value) -> WebhookEvent {
        let event = WebhookEvent {
            id: uuid::Uuid::new_v4().to_string(),
            received_at: Utc::now(),
            payload,
        };
        self.events.push_front(event.clone());
        self.events.truncate(self.capacity);
        event
    }

    pub fn items(&self) -> Vec<WebhookEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
