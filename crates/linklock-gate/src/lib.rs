pub mod classify;
pub mod eligibility;
pub mod scheduler;
pub mod session;

pub use classify::{classify, country_tier, detect_device, TIER1_COUNTRIES, TIER2_COUNTRIES};
pub use eligibility::eligible_tasks;
pub use scheduler::{DwellFired, DwellScheduler};
pub use session::{ClickOutcome, Dropoff, GateEntry, GateManager, UnlockOutcome, VisitSession};
