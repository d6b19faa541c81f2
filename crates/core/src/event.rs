//! Domain event system — decoupled observation of intake sessions.
//!
//! The controller and session driver publish events as turns progress.
//! Subscribers (CLI diagnostics, audit sinks) react without the core
//! knowing they exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use crate::session::Mode;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A user turn arrived for a session
    TurnReceived {
        session_id: String,
        content_chars: usize,
        has_context: bool,
        timestamp: DateTime<Utc>,
    },

    /// The router moved a session to a different mode
    ModeChanged {
        session_id: String,
        from: Mode,
        to: Mode,
        timestamp: DateTime<Utc>,
    },

    /// An emergency phrase was matched; the session is now critical
    EmergencyEscalated {
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    /// The controller produced a final reply
    ResponseGenerated {
        model: String,
        model_calls: u32,
        tokens_used: u32,
        degraded: bool,
        timestamp: DateTime<Utc>,
    },

    /// A tool passed validation and ran
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A tool call was blocked by its validator
    ToolRejected {
        tool_name: String,
        missing_fields: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// An error was absorbed and converted to text
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
