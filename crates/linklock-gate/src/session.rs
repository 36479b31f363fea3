use chrono::{DateTime, Utc};
use linklock_types::{
    AdTask, Device, LinklockError, LockerId, Result, TaskId, TaskState, Tier, VisitId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// One task slot in a visitor's gate list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateEntry {
    pub task_id: TaskId,
    pub title: String,
    pub description: String,
    pub ad_url: Option<String>,
    pub state: TaskState,
    pub started_at: Option<DateTime<Utc>>,
}

/// Ephemeral per-visitor session. Lives only in the gate manager; the
/// analytics log is the durable trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitSession {
    pub visit_id: VisitId,
    pub locker_id: LockerId,
    pub device: Device,
    pub country: String,
    pub tier: Tier,
    pub gate: Vec<GateEntry>,
    pub opened_at: DateTime<Utc>,
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl VisitSession {
    pub fn completed_count(&self) -> usize {
        self.gate
            .iter()
            .filter(|e| e.state == TaskState::Completed)
            .count()
    }

    pub fn total(&self) -> usize {
        self.gate.len()
    }

    /// All gated tasks completed. Vacuously true for an empty gate.
    pub fn is_complete(&self) -> bool {
        self.gate.iter().all(|e| e.state == TaskState::Completed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// The task moved to InProgress; the caller opens `ad_url`.
    Started { ad_url: String },
    /// Already InProgress; the click is a no-op.
    AlreadyStarted,
    /// Already Completed; the click is a no-op.
    AlreadyCompleted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnlockOutcome {
    Unlocked { duration_ms: u64 },
    StillLocked { completed: usize, total: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dropoff {
    pub completed_tasks: usize,
}

/// Tracks every open visit's unlock state machine. Each task advances
/// Pending -> InProgress -> Completed; transitions never move backward.
pub struct GateManager {
    visits: Arc<RwLock<HashMap<VisitId, VisitSession>>>,
}

impl Default for GateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl GateManager {
    pub fn new() -> Self {
        Self {
            visits: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates a session whose gate list mirrors `tasks` in order, all
    /// entries Pending.
    pub async fn open_visit(
        &self,
        locker_id: LockerId,
        device: Device,
        country: String,
        tier: Tier,
        tasks: &[AdTask],
    ) -> VisitSession {
        let visit_id = VisitId::generate();
        let gate: Vec<GateEntry> = tasks
            .iter()
            .map(|t| GateEntry {
                task_id: t.id.clone(),
                title: t.title.clone(),
                description: t.description.clone(),
                ad_url: t.ad_url.clone(),
                state: TaskState::Pending,
                started_at: None,
            })
            .collect();

        if gate.is_empty() {
            warn!(
                locker_id = %locker_id,
                device = %device,
                tier = %tier,
                "Visit opened with an empty gate list; unlock is immediate"
            );
        }

        let session = VisitSession {
            visit_id: visit_id.clone(),
            locker_id,
            device,
            country,
            tier,
            gate,
            opened_at: Utc::now(),
            unlocked_at: None,
        };

        let mut visits = self.visits.write().await;
        visits.insert(visit_id, session.clone());

        info!(
            visit_id = %session.visit_id,
            locker_id = %session.locker_id,
            device = %session.device,
            tier = %session.tier,
            gate_size = session.total(),
            "🔒 Visit opened"
        );
        session
    }

    pub async fn get(&self, visit_id: &VisitId) -> Option<VisitSession> {
        let visits = self.visits.read().await;
        visits.get(visit_id).cloned()
    }

    pub async fn open_count(&self) -> usize {
        let visits = self.visits.read().await;
        visits.len()
    }

    /// Visitor click on a gate entry. Only Pending tasks start; a task
    /// without an ad URL rejects the click and stays Pending (advertiser
    /// configuration error, not a visitor failure).
    pub async fn click_task(&self, visit_id: &VisitId, task_id: &TaskId) -> Result<ClickOutcome> {
        let mut visits = self.visits.write().await;
        let session = visits
            .get_mut(visit_id)
            .ok_or_else(|| LinklockError::VisitNotFound(visit_id.to_string()))?;
        let entry = session
            .gate
            .iter_mut()
            .find(|e| &e.task_id == task_id)
            .ok_or_else(|| LinklockError::TaskNotFound(task_id.to_string()))?;

        match entry.state {
            TaskState::Completed => Ok(ClickOutcome::AlreadyCompleted),
            TaskState::InProgress => Ok(ClickOutcome::AlreadyStarted),
            TaskState::Pending => {
                let ad_url = match entry.ad_url.as_deref() {
                    Some(url) if !url.trim().is_empty() => url.to_string(),
                    _ => {
                        return Err(LinklockError::MissingAdUrl(task_id.to_string()));
                    }
                };

                entry.state = TaskState::InProgress;
                entry.started_at = Some(Utc::now());
                info!(
                    visit_id = %visit_id,
                    task_id = %task_id,
                    "⏳ Task started"
                );
                Ok(ClickOutcome::Started { ad_url })
            }
        }
    }

    /// Dwell-timer completion. Idempotent check-then-set: only the first
    /// fire for an InProgress task transitions and returns `true`.
    pub async fn complete_task(&self, visit_id: &VisitId, task_id: &TaskId) -> Result<bool> {
        let mut visits = self.visits.write().await;
        let session = visits
            .get_mut(visit_id)
            .ok_or_else(|| LinklockError::VisitNotFound(visit_id.to_string()))?;
        let entry = session
            .gate
            .iter_mut()
            .find(|e| &e.task_id == task_id)
            .ok_or_else(|| LinklockError::TaskNotFound(task_id.to_string()))?;

        if entry.state != TaskState::InProgress {
            debug!(
                visit_id = %visit_id,
                task_id = %task_id,
                state = ?entry.state,
                "Completion fire ignored"
            );
            return Ok(false);
        }

        entry.state = TaskState::Completed;
        info!(
            visit_id = %visit_id,
            task_id = %task_id,
            completed = session.completed_count(),
            total = session.total(),
            "✅ Task completed"
        );
        Ok(true)
    }

    /// Visitor-triggered unlock attempt. Succeeds only when every gated
    /// task is Completed; otherwise it is a no-op that reports progress.
    pub async fn try_unlock(&self, visit_id: &VisitId) -> Result<UnlockOutcome> {
        let mut visits = self.visits.write().await;
        let session = visits
            .get_mut(visit_id)
            .ok_or_else(|| LinklockError::VisitNotFound(visit_id.to_string()))?;

        if !session.is_complete() {
            return Ok(UnlockOutcome::StillLocked {
                completed: session.completed_count(),
                total: session.total(),
            });
        }

        let now = Utc::now();
        let unlocked_at = *session.unlocked_at.get_or_insert(now);
        let duration_ms = (unlocked_at - session.opened_at).num_milliseconds().max(0) as u64;

        info!(
            visit_id = %visit_id,
            locker_id = %session.locker_id,
            duration_ms,
            "🔓 Visit unlocked"
        );
        Ok(UnlockOutcome::Unlocked { duration_ms })
    }

    /// Visit ended before unlock: removes the session and reports how many
    /// tasks had completed. Returns `None` for unknown visits and for
    /// visits that already unlocked (no dropoff after unlock).
    pub async fn abandon(&self, visit_id: &VisitId) -> Option<Dropoff> {
        let mut visits = self.visits.write().await;
        let session = visits.remove(visit_id)?;
        if session.unlocked_at.is_some() {
            return None;
        }

        info!(
            visit_id = %visit_id,
            locker_id = %session.locker_id,
            completed = session.completed_count(),
            total = session.total(),
            "👋 Visit abandoned"
        );
        Some(Dropoff {
            completed_tasks: session.completed_count(),
        })
    }
}
