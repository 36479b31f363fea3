use crate::storage::LedgerStorage;
use crate::types::RevenueEvent;
use linklock_types::{AccountId, Result, UsdMicros};
use std::sync::Arc;
use tracing::info;

/// Thin async facade over the ledger storage. Correctness under concurrent
/// credits comes from the storage increment primitive, so this layer keeps
/// no cache of its own.
pub struct BalanceManager {
    storage: Arc<dyn LedgerStorage>,
}

impl BalanceManager {
    pub fn new(storage: Arc<dyn LedgerStorage>) -> Self {
        Self { storage }
    }

    /// Credits `amount` to the account and returns the new balance.
    /// Balances only ever grow through this path; withdrawals live in a
    /// separate subsystem.
    pub async fn credit(&self, account: &AccountId, amount: UsdMicros) -> Result<UsdMicros> {
        if amount.is_zero() {
            return self.storage.get_balance(account).await;
        }

        let after = self.storage.credit_balance(account, amount).await?;

        info!(
            account = %account,
            amount = %amount,
            balance_after = %after,
            "💰 Balance credited"
        );
        Ok(after)
    }

    pub async fn get_balance(&self, account: &AccountId) -> Result<UsdMicros> {
        self.storage.get_balance(account).await
    }

    pub async fn revenue_history(&self, account: &AccountId) -> Result<Vec<RevenueEvent>> {
        self.storage.revenue_history(account).await
    }
}
