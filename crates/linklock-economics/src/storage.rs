use crate::types::RevenueEvent;
use async_trait::async_trait;
use linklock_types::{AccountId, LinklockError, Result, UsdMicros};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

type BalanceMap = HashMap<AccountId, UsdMicros>;

#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Atomically adds `amount` to the account balance and returns the new
    /// balance. Implementations must perform the increment as a single
    /// storage-level operation, never a read-modify-write across separate
    /// lock or transaction scopes.
    async fn credit_balance(&self, account: &AccountId, amount: UsdMicros) -> Result<UsdMicros>;

    async fn get_balance(&self, account: &AccountId) -> Result<UsdMicros>;

    async fn record_revenue(&self, event: RevenueEvent) -> Result<()>;

    async fn revenue_history(&self, account: &AccountId) -> Result<Vec<RevenueEvent>>;
}

pub struct MemoryLedger {
    balances: Arc<RwLock<BalanceMap>>,
    revenue: Arc<RwLock<Vec<RevenueEvent>>>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            balances: Arc::new(RwLock::new(HashMap::new())),
            revenue: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

#[async_trait]
impl LedgerStorage for MemoryLedger {
    async fn credit_balance(&self, account: &AccountId, amount: UsdMicros) -> Result<UsdMicros> {
        // The whole increment happens under one write-lock acquisition, so
        // concurrent credits to the same account serialize instead of
        // racing on a stale read.
        let mut balances = self.balances.write().await;
        let current = balances.get(account).copied().unwrap_or(UsdMicros::ZERO);
        let updated = current.checked_add(amount).ok_or_else(|| {
            LinklockError::Storage(format!("Balance overflow for {}", account))
        })?;
        balances.insert(account.clone(), updated);

        info!(
            account = %account,
            amount = %amount,
            balance_before = %current,
            balance_after = %updated,
            storage_type = "memory",
            "💾 Balance credited"
        );
        Ok(updated)
    }

    async fn get_balance(&self, account: &AccountId) -> Result<UsdMicros> {
        let balances = self.balances.read().await;
        Ok(balances.get(account).copied().unwrap_or(UsdMicros::ZERO))
    }

    async fn record_revenue(&self, event: RevenueEvent) -> Result<()> {
        let mut revenue = self.revenue.write().await;
        info!(
            owner = %event.owner,
            locker_id = %event.locker_id,
            task_id = %event.task_id,
            amount = %event.amount,
            tier = %event.tier,
            ledger_size = revenue.len() + 1,
            storage_type = "memory",
            "📦 Revenue event recorded"
        );
        revenue.push(event);
        Ok(())
    }

    async fn revenue_history(&self, account: &AccountId) -> Result<Vec<RevenueEvent>> {
        let revenue = self.revenue.read().await;
        Ok(revenue
            .iter()
            .filter(|e| &e.owner == account)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use linklock_types::{LockerId, TaskId, Tier, VisitId};

    #[tokio::test]
    async fn test_credit_and_read() {
        let ledger = MemoryLedger::new();
        let account = AccountId::new("creator-1");

        assert_eq!(
            ledger.get_balance(&account).await.unwrap(),
            UsdMicros::ZERO
        );

        let after = ledger
            .credit_balance(&account, UsdMicros::from_micros(2_800))
            .await
            .unwrap();
        assert_eq!(after.to_micros(), 2_800);
        assert_eq!(
            ledger.get_balance(&account).await.unwrap().to_micros(),
            2_800
        );
    }

    #[tokio::test]
    async fn test_concurrent_credits_never_lose_updates() {
        let ledger = Arc::new(MemoryLedger::new());
        let account = AccountId::new("creator-hot");

        let mut handles = Vec::new();
        for _ in 0..100 {
            let ledger = ledger.clone();
            let account = account.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .credit_balance(&account, UsdMicros::from_micros(7))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(
            ledger.get_balance(&account).await.unwrap().to_micros(),
            700
        );
    }

    #[tokio::test]
    async fn test_revenue_history_by_owner() {
        let ledger = MemoryLedger::new();
        let owner = AccountId::new("creator-2");

        for i in 0..3 {
            ledger
                .record_revenue(RevenueEvent {
                    owner: owner.clone(),
                    locker_id: LockerId::new("abc12"),
                    task_id: TaskId::new(format!("task-{}", i)),
                    visit_id: VisitId::generate(),
                    amount: UsdMicros::from_micros(4_500),
                    country: "US".to_string(),
                    tier: Tier::Tier1,
                    timestamp: Utc::now(),
                })
                .await
                .unwrap();
        }
        ledger
            .record_revenue(RevenueEvent {
                owner: AccountId::new("someone-else"),
                locker_id: LockerId::new("zzzzz"),
                task_id: TaskId::new("task-x"),
                visit_id: VisitId::generate(),
                amount: UsdMicros::from_micros(1),
                country: "BR".to_string(),
                tier: Tier::Tier3,
                timestamp: Utc::now(),
            })
            .await
            .unwrap();

        assert_eq!(ledger.revenue_history(&owner).await.unwrap().len(), 3);
    }
}
