//! Canonical z-value keys
//!
//! Sections are grouped by z, but raw f64 map keys make grouping depend on
//! exact floating-point bit patterns. Layer z values in this domain are
//! authored to at most a few decimal places (e.g. `2429.05`), so keys are
//! canonicalized to a fixed 1e-4 resolution: close enough never to split a
//! section, coarse enough never to merge two distinct ones.

use std::fmt;

const SCALE: f64 = 10_000.0;

/// Canonical per-z map key (ordered, hashable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZKey(i64);

impl ZKey {
    pub fn new(z: f64) -> ZKey {
        ZKey((z * SCALE).round() as i64)
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / SCALE
    }
}

impl From<f64> for ZKey {
    fn from(z: f64) -> ZKey {
        ZKey::new(z)
    }
}

impl fmt::Display for ZKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearby_values_share_a_key() {
        assert_eq!(ZKey::new(2429.05), ZKey::new(2429.050000001));
    }

    #[test]
    fn test_distinct_sections_get_distinct_keys() {
        assert_ne!(ZKey::new(2429.0), ZKey::new(2429.05));
        assert_ne!(ZKey::new(100.0), ZKey::new(101.0));
    }

    #[test]
    fn test_round_trip_display() {
        assert_eq!(ZKey::new(102524.0).as_f64(), 102524.0);
        assert_eq!(format!("{}", ZKey::new(2429.3)), "2429.3");
    }
}
