//! Endpoint lifecycle events.
//!
//! The registry queues one event per lifecycle transition while it holds its
//! state lock and dispatches them to subscribers once the lock is released.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Endpoint;

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// Which transition the event records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// First sighting of an address on the segment.
    New,
    /// Liveness decayed to zero and the endpoint was evicted.
    Lost,
}

/// An endpoint lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEvent {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    /// The endpoint as it was when the transition happened.
    pub endpoint: Endpoint,
}

impl RegistryEvent {
    pub fn new(kind: EventKind, endpoint: Endpoint) -> Self {
        Self {
            id: EventId::new(),
            timestamp: Utc::now(),
            kind,
            endpoint,
        }
    }

    pub fn new_endpoint(endpoint: Endpoint) -> Self {
        Self::new(EventKind::New, endpoint)
    }

    pub fn lost_endpoint(endpoint: Endpoint) -> Self {
        Self::new(EventKind::Lost, endpoint)
    }
}
