//! Server event bus.
//!
//! Subscribers receive every [`ServerEvent`] published after they subscribed.
//! Publishing never blocks; slow subscribers see `RecvError::Lagged`.

use crate::types::{PerformanceMetrics, PlayerId, ServerStatus, SessionId};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::trace;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Which metric triggered a [`ServerEvent::PerformanceAlert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertKind {
    Cpu,
    Memory,
    Latency,
}

/// Notifications published by the server manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ServerEvent {
    StatusChanged {
        previous: ServerStatus,
        current: ServerStatus,
    },
    PlayerConnected {
        player_id: PlayerId,
    },
    PlayerDisconnected {
        player_id: PlayerId,
        reason: String,
    },
    SessionCreated {
        session_id: SessionId,
        name: String,
    },
    SessionEnded {
        session_id: SessionId,
        duration: Duration,
    },
    MetricsUpdated(PerformanceMetrics),
    PerformanceAlert {
        kind: AlertKind,
        value: f32,
        threshold: f32,
    },
    SecurityEvent {
        event: String,
        player_id: PlayerId,
    },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ServerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Publishes to all current subscribers. Having none is not an error.
    pub fn publish(&self, event: ServerEvent) {
        trace!(?event, "Publishing server event");
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
