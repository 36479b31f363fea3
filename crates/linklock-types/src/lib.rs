pub mod amount;
pub mod device;
pub mod error;
pub mod id;
pub mod locker;
pub mod task;

pub use amount::{UsdMicros, USD_BASE_UNIT, USD_DECIMALS};
pub use device::{Device, Tier};
pub use error::{LinklockError, Result};
pub use id::{AccountId, LockerId, TaskId, VisitId};
pub use locker::Locker;
pub use task::{AdTask, TaskState, TaskStatus};
