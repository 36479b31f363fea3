//! Event bus for visit and revenue state changes.
//!
//! Notifies in-process consumers (API streaming, tests) without polling.
//! If nobody is subscribed, events are dropped; that is expected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_BUFFER: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LockerEvent {
    VisitOpened {
        locker_id: String,
        visit_id: String,
        device: String,
        tier: String,
        gate_size: usize,
        #[serde(with = "chrono::serde::ts_seconds")]
        timestamp: DateTime<Utc>,
    },

    TaskStarted {
        visit_id: String,
        task_id: String,
        #[serde(with = "chrono::serde::ts_seconds")]
        timestamp: DateTime<Utc>,
    },

    TaskCompleted {
        visit_id: String,
        task_id: String,
        #[serde(with = "chrono::serde::ts_seconds")]
        timestamp: DateTime<Utc>,
    },

    RevenueAttributed {
        owner: String,
        locker_id: String,
        task_id: String,
        amount_usd: f64,
        tier: String,
        #[serde(with = "chrono::serde::ts_seconds")]
        timestamp: DateTime<Utc>,
    },

    VisitUnlocked {
        locker_id: String,
        visit_id: String,
        duration_ms: u64,
        #[serde(with = "chrono::serde::ts_seconds")]
        timestamp: DateTime<Utc>,
    },

    VisitDropped {
        locker_id: String,
        visit_id: String,
        completed_tasks: usize,
        #[serde(with = "chrono::serde::ts_seconds")]
        timestamp: DateTime<Utc>,
    },
}

impl LockerEvent {
    /// Event name used by streaming consumers.
    pub fn event_type(&self) -> &'static str {
        match self {
            LockerEvent::VisitOpened { .. } => "visit.opened",
            LockerEvent::TaskStarted { .. } => "task.started",
            LockerEvent::TaskCompleted { .. } => "task.completed",
            LockerEvent::RevenueAttributed { .. } => "revenue.attributed",
            LockerEvent::VisitUnlocked { .. } => "visit.unlocked",
            LockerEvent::VisitDropped { .. } => "visit.dropped",
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LockerEvent>,
    emitted: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            tx,
            emitted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LockerEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: LockerEvent) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        match self.tx.send(event.clone()) {
            Ok(subscribers) => {
                debug!(
                    event_type = event.event_type(),
                    subscribers, "Event emitted"
                );
            }
            Err(_) => {
                debug!(
                    event_type = event.event_type(),
                    "Event emitted but no subscribers listening"
                );
            }
        }
    }

    pub fn total_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
