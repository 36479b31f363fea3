pub mod attribution;
pub mod balance;
pub mod storage;
pub mod types;

pub use attribution::AttributionEngine;
pub use balance::BalanceManager;
pub use storage::{LedgerStorage, MemoryLedger};
pub use types::RevenueEvent;
