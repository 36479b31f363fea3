use serde::{Deserialize, Serialize};
use std::fmt;

pub const USD_DECIMALS: u32 = 6;
pub const USD_BASE_UNIT: u64 = 1_000_000; // 10^6 micros per dollar

/// Currency amount in integer micro-dollars. All balance arithmetic stays
/// in base units so concurrent credits never lose fractional cents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct UsdMicros(u64);

impl UsdMicros {
    pub const ZERO: Self = Self(0);

    pub fn from_usd(usd: f64) -> Self {
        if !usd.is_finite() || usd <= 0.0 {
            return Self::ZERO;
        }
        Self((usd * USD_BASE_UNIT as f64).round() as u64)
    }

    pub fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    pub fn to_usd(&self) -> f64 {
        self.0 as f64 / USD_BASE_UNIT as f64
    }

    pub fn to_micros(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parses a decimal CPM string. Unparseable, missing, or non-positive
    /// input yields zero so a misconfigured task excludes itself from
    /// gating instead of failing the visit.
    pub fn parse_lossy(s: &str) -> Self {
        match s.trim().parse::<f64>() {
            Ok(v) => Self::from_usd(v),
            Err(_) => Self::ZERO,
        }
    }

    /// CPM is priced per 1000 completions; a single completion earns 1/1000.
    pub fn per_mille(&self) -> Self {
        Self(self.0 / 1000)
    }

    pub fn checked_add(&self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn saturating_add(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for UsdMicros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.6}", self.to_usd())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lossy() {
        assert_eq!(UsdMicros::parse_lossy("4.50").to_micros(), 4_500_000);
        assert_eq!(UsdMicros::parse_lossy("0"), UsdMicros::ZERO);
        assert_eq!(UsdMicros::parse_lossy(""), UsdMicros::ZERO);
        assert_eq!(UsdMicros::parse_lossy("not-a-number"), UsdMicros::ZERO);
        assert_eq!(UsdMicros::parse_lossy("-2.50"), UsdMicros::ZERO);
        assert_eq!(UsdMicros::parse_lossy(" 2.80 ").to_micros(), 2_800_000);
    }

    #[test]
    fn test_per_mille() {
        // $2.80 CPM pays $0.0028 per completion
        let cpm = UsdMicros::parse_lossy("2.80");
        assert_eq!(cpm.per_mille().to_micros(), 2_800);
        assert!((cpm.per_mille().to_usd() - 0.0028).abs() < 1e-12);

        assert_eq!(UsdMicros::ZERO.per_mille(), UsdMicros::ZERO);
    }

    #[test]
    fn test_arithmetic() {
        let a = UsdMicros::from_micros(100);
        let b = UsdMicros::from_micros(50);
        assert_eq!(a.checked_add(b), Some(UsdMicros::from_micros(150)));
        assert_eq!(a.saturating_sub(b), UsdMicros::from_micros(50));
        assert_eq!(b.saturating_sub(a), UsdMicros::ZERO);
        assert_eq!(
            UsdMicros::from_micros(u64::MAX).checked_add(UsdMicros::from_micros(1)),
            None
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(UsdMicros::from_micros(2_800).to_string(), "$0.002800");
    }
}
