//! In-process event fan-out for state changes raised by the services.
//!
//! Delivery is best-effort and unordered: a slow or dropped subscriber never
//! blocks a publisher, and callbacks may arrive more than once under retry.
//! Subscribers that can't keep up simply miss events rather than stall the
//! bus.

use crate::ids::{DocumentId, TaskId, WorkflowId, WorkspaceId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};

/// The set of event kinds the bus fans out. New variants should be additive
/// so existing subscribers filtering by `EventType` keep compiling.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
    TaskStatusChanged,
    WorkflowStepCompleted,
    WorkflowExecutionFinished,
    DocumentUpdated,
    WorkspaceStateUpdated,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    TaskStatusChanged {
        task_id: TaskId,
        from: String,
        to: String,
    },
    WorkflowStepCompleted {
        execution_id: crate::ids::ExecutionId,
        step_id: String,
    },
    WorkflowExecutionFinished {
        execution_id: crate::ids::ExecutionId,
        workflow_id: WorkflowId,
    },
    DocumentUpdated {
        document_id: DocumentId,
        version: u64,
    },
    WorkspaceStateUpdated {
        workspace_id: WorkspaceId,
        version: u64,
    },
}

impl Event {
    pub fn event_type(&self) -> EventType {
        match self {
            Event::TaskStatusChanged { .. } => EventType::TaskStatusChanged,
            Event::WorkflowStepCompleted { .. } => EventType::WorkflowStepCompleted,
            Event::WorkflowExecutionFinished { .. } => EventType::WorkflowExecutionFinished,
            Event::DocumentUpdated { .. } => EventType::DocumentUpdated,
            Event::WorkspaceStateUpdated { .. } => EventType::WorkspaceStateUpdated,
        }
    }
}

/// Bounded per-subscriber queue depth; a subscriber falling this far behind
/// starts silently dropping events rather than backing up publishers.
const SUBSCRIBER_CAPACITY: usize = 256;

struct Subscriber {
    event_type: EventType,
    sender: mpsc::Sender<Event>,
}

/// Shared, cloneable handle to the bus's subscriber map, guarded by a
/// reader-writer lock since publishes (reads) vastly outnumber
/// subscribe/unsubscribe (writes).
#[derive(Clone, Default)]
pub struct NotificationBus {
    subscribers: std::sync::Arc<RwLock<HashMap<u64, Subscriber>>>,
    next_id: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

/// A live subscription; dropping it does not unsubscribe automatically —
/// call [`NotificationBus::unsubscribe`] explicitly, mirroring the
/// broker's explicit unlock contract.
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<Event>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, event_type: EventType) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.subscribers.write().await.insert(
            id,
            Subscriber {
                event_type,
                sender: tx,
            },
        );
        Subscription { id, receiver: rx }
    }

    pub async fn unsubscribe(&self, id: u64) {
        self.subscribers.write().await.remove(&id);
    }

    /// Fan an event out to every matching subscriber on its own task. Never
    /// awaits a slow subscriber: a full channel drops the event for that
    /// subscriber instead of blocking the publisher.
    pub async fn publish(&self, event: Event) {
        let event_type = event.event_type();
        let subscribers = self.subscribers.read().await;
        for sub in subscribers.values() {
            if sub.event_type != event_type {
                continue;
            }
            let sender = sub.sender.clone();
            let event = event.clone();
            tokio::spawn(async move {
                let _ = sender.try_send(event);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TaskId;

    #[tokio::test]
    async fn subscriber_receives_matching_events_only() {
        let bus = NotificationBus::new();
        let mut sub = bus.subscribe(EventType::TaskStatusChanged).await;

        bus.publish(Event::DocumentUpdated {
            document_id: DocumentId::new(),
            version: 1,
        })
        .await;
        bus.publish(Event::TaskStatusChanged {
            task_id: TaskId::new(),
            from: "Pending".into(),
            to: "Assigned".into(),
        })
        .await;

        let received = sub.receiver.recv().await.expect("event delivered");
        assert_eq!(received.event_type(), EventType::TaskStatusChanged);
    }

    #[tokio::test]
    async fn unsubscribe_stops_further_delivery() {
        let bus = NotificationBus::new();
        let sub = bus.subscribe(EventType::DocumentUpdated).await;
        bus.unsubscribe(sub.id).await;

        bus.publish(Event::DocumentUpdated {
            document_id: DocumentId::new(),
            version: 1,
        })
        .await;

        assert!(bus.subscribers.read().await.is_empty());
    }
}
