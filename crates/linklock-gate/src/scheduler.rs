use linklock_types::{LockerId, TaskId, Tier, VisitId};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Context carried from a click to the completion that fires after the
/// dwell interval.
#[derive(Debug, Clone)]
pub struct DwellFired {
    pub visit_id: VisitId,
    pub locker_id: LockerId,
    pub task_id: TaskId,
    pub country: String,
    pub tier: Tier,
}

/// Schedules the fixed-dwell auto-completion for started tasks.
///
/// A scheduled fire is not cancellable: once the visitor clicks, the task
/// completes after the dwell interval whether or not the ad tab stays
/// open. Downstream completion is idempotent, so duplicate or late fires
/// are harmless.
#[derive(Clone)]
pub struct DwellScheduler {
    dwell: Duration,
    tx: mpsc::Sender<DwellFired>,
}

impl DwellScheduler {
    pub fn new(dwell: Duration) -> (Self, mpsc::Receiver<DwellFired>) {
        let (tx, rx) = mpsc::channel(256);
        (Self { dwell, tx }, rx)
    }

    pub fn dwell(&self) -> Duration {
        self.dwell
    }

    pub fn schedule(&self, fired: DwellFired) {
        let tx = self.tx.clone();
        let dwell = self.dwell;
        tokio::spawn(async move {
            tokio::time::sleep(dwell).await;
            if tx.send(fired).await.is_err() {
                debug!("Dwell fire dropped; completion channel closed");
            }
        });
    }
}
