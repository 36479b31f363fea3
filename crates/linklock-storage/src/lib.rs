pub mod analytics;
pub mod catalog;
pub mod lockers;

pub use analytics::{AnalyticsEvent, AnalyticsKind, AnalyticsStore, MemoryAnalytics};
pub use catalog::{MemoryCatalog, TaskCatalog, TaskDraft};
pub use lockers::{generate_short_id, LockerStore, MemoryLockerStore, SHORT_ID_LEN};
