use async_trait::async_trait;
use chrono::Utc;
use linklock_types::{AdTask, Device, LinklockError, Result, TaskId, TaskStatus, UsdMicros};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Admin input for creating or replacing a catalog task. CPM values arrive
/// as decimal strings and parse lossily: anything unparseable becomes zero,
/// which excludes the task from gating for that tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub ad_url: Option<String>,
    pub devices: Vec<Device>,
    pub cpm_tier1: String,
    pub cpm_tier2: String,
    pub cpm_tier3: String,
    pub status: TaskStatus,
}

/// The global singleton task catalog. Reads are safe under eventual
/// consistency; a task edited mid-visit may or may not apply to in-flight
/// visitors.
#[async_trait]
pub trait TaskCatalog: Send + Sync {
    /// Returns all tasks in catalog order. This order determines the
    /// sequence visitors complete tasks in.
    async fn list(&self) -> Result<Vec<AdTask>>;

    async fn get(&self, id: &TaskId) -> Result<Option<AdTask>>;

    async fn insert(&self, draft: TaskDraft) -> Result<AdTask>;

    async fn update(&self, task: AdTask) -> Result<AdTask>;

    async fn remove(&self, id: &TaskId) -> Result<()>;
}

pub struct MemoryCatalog {
    tasks: Arc<RwLock<Vec<AdTask>>>,
    next_seq: AtomicU64,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(Vec::new())),
            next_seq: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl TaskCatalog for MemoryCatalog {
    async fn list(&self) -> Result<Vec<AdTask>> {
        let tasks = self.tasks.read().await;
        Ok(tasks.clone())
    }

    async fn get(&self, id: &TaskId) -> Result<Option<AdTask>> {
        let tasks = self.tasks.read().await;
        Ok(tasks.iter().find(|t| &t.id == id).cloned())
    }

    async fn insert(&self, draft: TaskDraft) -> Result<AdTask> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let task = AdTask {
            id: TaskId::new(format!("task-{}", seq)),
            title: draft.title,
            description: draft.description,
            ad_url: draft.ad_url,
            devices: draft.devices,
            cpm_tier1: UsdMicros::parse_lossy(&draft.cpm_tier1),
            cpm_tier2: UsdMicros::parse_lossy(&draft.cpm_tier2),
            cpm_tier3: UsdMicros::parse_lossy(&draft.cpm_tier3),
            status: draft.status,
            created_at: Utc::now(),
        };

        let mut tasks = self.tasks.write().await;
        tasks.push(task.clone());

        info!(
            task_id = %task.id,
            title = %task.title,
            catalog_size = tasks.len(),
            "📦 Task added to catalog"
        );
        Ok(task)
    }

    async fn update(&self, task: AdTask) -> Result<AdTask> {
        let mut tasks = self.tasks.write().await;
        match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => {
                *slot = task.clone();
                Ok(task)
            }
            None => Err(LinklockError::TaskNotFound(task.id.to_string())),
        }
    }

    async fn remove(&self, id: &TaskId) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|t| &t.id != id);
        if tasks.len() == before {
            return Err(LinklockError::TaskNotFound(id.to_string()));
        }
        Ok(())
    }
}
