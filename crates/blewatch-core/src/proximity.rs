//! RSSI-based proximity buckets.
//!
//! Signal strength is a poor distance proxy, so the estimate is deliberately coarse:
//!
//! | RSSI (dBm)      | Bucket   |
//! |-----------------|----------|
//! | `-60 ..= 0`     | Near     |
//! | `-70 < r < -60` | Moderate |
//! | `-80 < r <= -70`| Far      |
//! | `r <= -80`      | VeryFar  |
//!
//! Positive or non-finite readings are not real measurements (some stacks report `127`
//! when RSSI is unavailable) and map to [`Distance::VeryFar`].

use serde::{Deserialize, Serialize};

/// Coarse distance estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    /// Roughly one to two metres.
    Near,
    /// Roughly two to five metres.
    Moderate,
    /// Roughly five to ten metres.
    Far,
    /// Further than ten metres, or no usable reading.
    VeryFar,
}

impl Distance {
    /// Display string including the approximate range.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Near => "Near (~1–2m)",
            Self::Moderate => "Moderate (~2–5m)",
            Self::Far => "Far (~5–10m)",
            Self::VeryFar => "Very far (>10m)",
        }
    }
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a signal strength in dBm to a distance bucket.
///
/// Total over every input; see the module docs for the bucket boundaries.
#[must_use]
pub fn estimate_distance(rssi: impl Into<f64>) -> Distance {
    let rssi = rssi.into();
    if (-60.0..=0.0).contains(&rssi) {
        Distance::Near
    } else if rssi > -70.0 && rssi < -60.0 {
        Distance::Moderate
    } else if rssi > -80.0 && rssi <= -70.0 {
        Distance::Far
    } else {
        Distance::VeryFar
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(estimate_distance(0), Distance::Near);
        assert_eq!(estimate_distance(-60), Distance::Near);
        assert_eq!(estimate_distance(-60.001), Distance::Moderate);
        assert_eq!(estimate_distance(-69), Distance::Moderate);
        assert_eq!(estimate_distance(-70), Distance::Far);
        assert_eq!(estimate_distance(-79), Distance::Far);
        assert_eq!(estimate_distance(-80), Distance::VeryFar);
        assert_eq!(estimate_distance(-95), Distance::VeryFar);
    }

    #[test]
    fn test_accepts_i16_readings() {
        assert_eq!(estimate_distance(-45_i16), Distance::Near);
        assert_eq!(estimate_distance(i16::MIN), Distance::VeryFar);
    }

    #[test]
    fn test_unusable_readings_are_very_far() {
        assert_eq!(estimate_distance(127), Distance::VeryFar);
        assert_eq!(estimate_distance(0.5), Distance::VeryFar);
        assert_eq!(estimate_distance(f64::NAN), Distance::VeryFar);
        assert_eq!(estimate_distance(f64::NEG_INFINITY), Distance::VeryFar);
    }

    #[test]
    fn test_labels() {
        assert_eq!(Distance::Near.to_string(), "Near (~1–2m)");
        assert_eq!(Distance::Moderate.label(), "Moderate (~2–5m)");
        assert_eq!(Distance::Far.label(), "Far (~5–10m)");
        assert_eq!(Distance::VeryFar.label(), "Very far (>10m)");
    }

    #[test]
    fn test_ordering_is_nearest_first() {
        assert!(Distance::Near < Distance::Moderate);
        assert!(Distance::Far < Distance::VeryFar);
    }
}
