use async_trait::async_trait;
use chrono::{DateTime, Utc};
use linklock_types::{LockerId, Result, TaskId, Tier, VisitId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalyticsKind {
    #[serde(rename = "visit")]
    Visit,
    #[serde(rename = "task_complete")]
    TaskComplete,
    #[serde(rename = "unlock")]
    Unlock,
    #[serde(rename = "dropoff")]
    Dropoff,
}

/// One row of visit telemetry. Best-effort: events may be lost if the
/// visitor's browser terminates before the event is flushed. Not part of
/// the financial ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub locker_id: LockerId,
    pub kind: AnalyticsKind,
    pub visit_id: Option<VisitId>,
    pub task_id: Option<TaskId>,
    pub completed_tasks: Option<usize>,
    pub duration_ms: Option<u64>,
    pub country: Option<String>,
    pub tier: Option<Tier>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
}

impl AnalyticsEvent {
    pub fn visit(locker_id: LockerId, visit_id: VisitId, country: String, tier: Tier) -> Self {
        Self {
            locker_id,
            kind: AnalyticsKind::Visit,
            visit_id: Some(visit_id),
            task_id: None,
            completed_tasks: None,
            duration_ms: None,
            country: Some(country),
            tier: Some(tier),
            timestamp: Utc::now(),
        }
    }

    pub fn task_complete(
        locker_id: LockerId,
        visit_id: VisitId,
        task_id: TaskId,
        country: String,
        tier: Tier,
    ) -> Self {
        Self {
            locker_id,
            kind: AnalyticsKind::TaskComplete,
            visit_id: Some(visit_id),
            task_id: Some(task_id),
            completed_tasks: None,
            duration_ms: None,
            country: Some(country),
            tier: Some(tier),
            timestamp: Utc::now(),
        }
    }

    pub fn unlock(locker_id: LockerId, visit_id: VisitId, duration_ms: u64) -> Self {
        Self {
            locker_id,
            kind: AnalyticsKind::Unlock,
            visit_id: Some(visit_id),
            task_id: None,
            completed_tasks: None,
            duration_ms: Some(duration_ms),
            country: None,
            tier: None,
            timestamp: Utc::now(),
        }
    }

    pub fn dropoff(locker_id: LockerId, visit_id: VisitId, completed_tasks: usize) -> Self {
        Self {
            locker_id,
            kind: AnalyticsKind::Dropoff,
            visit_id: Some(visit_id),
            task_id: None,
            completed_tasks: Some(completed_tasks),
            duration_ms: None,
            country: None,
            tier: None,
            timestamp: Utc::now(),
        }
    }
}

/// Append-only sink for visit telemetry.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn append(&self, event: AnalyticsEvent) -> Result<()>;

    async fn for_locker(&self, id: &LockerId) -> Result<Vec<AnalyticsEvent>>;

    async fn count(&self) -> Result<usize>;
}

pub struct MemoryAnalytics {
    events: Arc<RwLock<Vec<AnalyticsEvent>>>,
}

impl Default for MemoryAnalytics {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAnalytics {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

#[async_trait]
impl AnalyticsStore for MemoryAnalytics {
    async fn append(&self, event: AnalyticsEvent) -> Result<()> {
        let mut events = self.events.write().await;
        debug!(
            locker_id = %event.locker_id,
            kind = ?event.kind,
            log_size = events.len() + 1,
            "Analytics event appended"
        );
        events.push(event);
        Ok(())
    }

    async fn for_locker(&self, id: &LockerId) -> Result<Vec<AnalyticsEvent>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| &e.locker_id == id)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let events = self.events.read().await;
        Ok(events.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_only_log() {
        let store = MemoryAnalytics::new();
        let locker = LockerId::new("abc12");
        let visit = VisitId::generate();

        store
            .append(AnalyticsEvent::visit(
                locker.clone(),
                visit.clone(),
                "US".to_string(),
                Tier::Tier1,
            ))
            .await
            .unwrap();
        store
            .append(AnalyticsEvent::dropoff(locker.clone(), visit, 3))
            .await
            .unwrap();

        let events = store.for_locker(&locker).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, AnalyticsKind::Visit);
        assert_eq!(events[1].kind, AnalyticsKind::Dropoff);
        assert_eq!(events[1].completed_tasks, Some(3));
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_filter_by_locker() {
        let store = MemoryAnalytics::new();
        let a = LockerId::new("aaaaa");
        let b = LockerId::new("bbbbb");

        store
            .append(AnalyticsEvent::unlock(a.clone(), VisitId::generate(), 1200))
            .await
            .unwrap();
        store
            .append(AnalyticsEvent::unlock(b, VisitId::generate(), 900))
            .await
            .unwrap();

        assert_eq!(store.for_locker(&a).await.unwrap().len(), 1);
    }
}
