pub mod api;
pub mod config;
pub mod events;
pub mod geo;
pub mod logging;
pub mod metrics;
pub mod node;

pub use config::NodeConfig;
pub use events::{EventBus, LockerEvent};
pub use metrics::Metrics;
pub use node::{LockerNode, NodeStats, UnlockResponse, VisitOverview};
