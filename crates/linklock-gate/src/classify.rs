use linklock_types::{Device, Tier};

/// Countries billed at the Tier-1 CPM rate.
pub const TIER1_COUNTRIES: [&str; 8] = ["US", "UK", "CA", "AU", "DE", "NL", "SE", "NO"];

/// Countries billed at the Tier-2 CPM rate. Disjoint from Tier-1 by
/// construction; everything else resolves to Tier-3.
pub const TIER2_COUNTRIES: [&str; 7] = ["FR", "IT", "ES", "JP", "KR", "SG", "HK"];

/// Resolves the visitor's device class from the user-agent signature.
/// Rules are checked in order; the first match wins.
pub fn detect_device(user_agent: &str) -> Device {
    if user_agent.to_ascii_lowercase().contains("android") {
        return Device::Android;
    }
    if ["iPad", "iPhone", "iPod"]
        .iter()
        .any(|p| user_agent.contains(p))
    {
        return Device::Ios;
    }
    if ["Macintosh", "MacIntel", "MacPPC", "Mac68K"]
        .iter()
        .any(|p| user_agent.contains(p))
    {
        return Device::Mac;
    }
    if ["Win32", "Win64", "Windows", "WinCE"]
        .iter()
        .any(|p| user_agent.contains(p))
    {
        return Device::Windows;
    }
    Device::Other
}

/// Maps a country code to its CPM tier. Tier-1 is checked first, then
/// Tier-2; membership in neither yields Tier-3.
pub fn country_tier(country: &str) -> Tier {
    let code = country.trim().to_ascii_uppercase();
    if TIER1_COUNTRIES.contains(&code.as_str()) {
        Tier::Tier1
    } else if TIER2_COUNTRIES.contains(&code.as_str()) {
        Tier::Tier2
    } else {
        Tier::Tier3
    }
}

/// Pure classification of a visitor. Geolocation failures are handled
/// upstream by substituting the configured fallback country before this
/// call, so classification itself never fails.
pub fn classify(user_agent: &str, country: &str) -> (Device, Tier) {
    (detect_device(user_agent), country_tier(country))
}
