use chrono::{DateTime, Utc};
use linklock_types::{AccountId, LockerId, TaskId, Tier, UsdMicros, VisitId};
use serde::{Deserialize, Serialize};

/// One credited task completion. Created exactly once per (visit, task)
/// pair; never mutated or deleted. Balances are derived from this ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueEvent {
    pub owner: AccountId,
    pub locker_id: LockerId,
    pub task_id: TaskId,
    pub visit_id: VisitId,
    pub amount: UsdMicros,
    pub country: String,
    pub tier: Tier,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
}
