//! Domain event system — decoupled observation of engine activity.
//!
//! Events are published when a pursuit starts or resolves, when a retry
//! attempt is abandoned, and as sequence steps complete. Subscribers (log
//! forwarders, dashboards, tests) can react without coupling to the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::goal::{PursuitGoal, PursuitOutcome};

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A goal was installed on the mover
    PursuitStarted {
        session_id: String,
        goal: PursuitGoal,
        deadline_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A pursuit produced its terminal outcome
    PursuitResolved {
        session_id: String,
        outcome: PursuitOutcome,
        elapsed_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A retry attempt against one candidate was given up
    AttemptAbandoned {
        session_id: String,
        attempt: usize,
        candidate: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A sequence step finished
    StepCompleted {
        session_id: String,
        index: usize,
        step: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },

    /// A container window was closed
    ContainerClosed {
        session_id: String,
        container: String,
        timestamp: DateTime<Utc>,
    },

    /// The in-flight activity was cancelled by a stop request
    ActivityCancelled {
        session_id: String,
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
