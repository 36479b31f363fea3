use crate::amount::UsdMicros;
use crate::device::{Device, Tier};
use crate::id::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Active,
    Inactive,
}

/// Per-visit completion state of a single gated task.
///
/// Transitions are strictly forward: Pending -> InProgress -> Completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Pending,
    InProgress,
    Completed,
}

/// An advertiser task from the global catalog. Visitors open `ad_url` and
/// the task auto-completes after the dwell interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdTask {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub ad_url: Option<String>,
    pub devices: Vec<Device>,
    pub cpm_tier1: UsdMicros,
    pub cpm_tier2: UsdMicros,
    pub cpm_tier3: UsdMicros,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl AdTask {
    pub fn cpm_for(&self, tier: Tier) -> UsdMicros {
        match tier {
            Tier::Tier1 => self.cpm_tier1,
            Tier::Tier2 => self.cpm_tier2,
            Tier::Tier3 => self.cpm_tier3,
        }
    }

    pub fn supports(&self, device: Device) -> bool {
        self.devices.contains(&device)
    }

    pub fn is_active(&self) -> bool {
        self.status == TaskStatus::Active
    }

    pub fn has_ad_url(&self) -> bool {
        self.ad_url
            .as_deref()
            .map_or(false, |url| !url.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> AdTask {
        AdTask {
            id: TaskId::new("t1"),
            title: "Visit sponsor".to_string(),
            description: "Open the sponsor page".to_string(),
            ad_url: Some("https://ads.example.com/1".to_string()),
            devices: vec![Device::Windows, Device::Android],
            cpm_tier1: UsdMicros::parse_lossy("4.50"),
            cpm_tier2: UsdMicros::parse_lossy("2.80"),
            cpm_tier3: UsdMicros::ZERO,
            status: TaskStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_cpm_for_tier() {
        let t = task();
        assert_eq!(t.cpm_for(Tier::Tier1).to_micros(), 4_500_000);
        assert_eq!(t.cpm_for(Tier::Tier2).to_micros(), 2_800_000);
        assert_eq!(t.cpm_for(Tier::Tier3), UsdMicros::ZERO);
    }

    #[test]
    fn test_device_support() {
        let t = task();
        assert!(t.supports(Device::Windows));
        assert!(!t.supports(Device::Ios));
    }

    #[test]
    fn test_has_ad_url() {
        let mut t = task();
        assert!(t.has_ad_url());
        t.ad_url = Some("   ".to_string());
        assert!(!t.has_ad_url());
        t.ad_url = None;
        assert!(!t.has_ad_url());
    }
}
