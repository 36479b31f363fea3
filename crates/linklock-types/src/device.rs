use serde::{Deserialize, Serialize};
use std::fmt;

/// Visitor device class resolved from the user-agent signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    Windows,
    Mac,
    Android,
    #[serde(rename = "iOS")]
    Ios,
    Other,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Device::Windows => "Windows",
            Device::Mac => "Mac",
            Device::Android => "Android",
            Device::Ios => "iOS",
            Device::Other => "Other",
        };
        write!(f, "{}", name)
    }
}

/// Geographic CPM bracket. Tier-1 pays the highest rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "tier1")]
    Tier1,
    #[serde(rename = "tier2")]
    Tier2,
    #[serde(rename = "tier3")]
    Tier3,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Tier1 => "tier1",
            Tier::Tier2 => "tier2",
            Tier::Tier3 => "tier3",
        };
        write!(f, "{}", name)
    }
}
