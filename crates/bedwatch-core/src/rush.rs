//! Rush timing prediction.
//!
//! [`estimate`] is a pure table function from a per-map base timing, the
//! strongest enemy team's average threat and the nearest enemy's distance to
//! our bed, to a predicted time-to-first-rush and a risk label.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Lower bound of any estimate, in seconds.
pub const MIN_ETA_SECS: i32 = 12;

/// Upper bound of any estimate, in seconds.
pub const MAX_ETA_SECS: i32 = 70;

/// ETAs at or below this are HIGH risk.
const HIGH_RISK_MAX_ETA: i32 = 20;

/// ETAs at or below this (and above [`HIGH_RISK_MAX_ETA`]) are MEDIUM risk.
const MEDIUM_RISK_MAX_ETA: i32 = 36;

/// Risk label of a rush estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RushRisk {
    /// More than 36 seconds away.
    Low,
    /// 21–36 seconds away.
    Medium,
    /// 20 seconds or less.
    High,
}

impl RushRisk {
    /// Upper-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    /// Bucket an ETA.
    pub fn from_eta(eta_seconds: i32) -> Self {
        if eta_seconds <= HIGH_RISK_MAX_ETA {
            Self::High
        } else if eta_seconds <= MEDIUM_RISK_MAX_ETA {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for RushRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of [`estimate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RushEstimate {
    /// Predicted seconds until the first rush, clamped to 12..=70.
    pub eta_seconds: i32,
    /// Risk label for the ETA.
    pub risk: RushRisk,
}

/// Seconds shaved off by the strongest enemy team's average threat.
fn threat_adjustment(highest_enemy_threat_avg: f64) -> i32 {
    if highest_enemy_threat_avg >= 3.2 {
        8
    } else if highest_enemy_threat_avg >= 2.5 {
        5
    } else if highest_enemy_threat_avg >= 1.5 {
        2
    } else {
        0
    }
}

/// Seconds shaved off by the nearest enemy's distance. Non-positive distance
/// means unknown and adjusts nothing.
fn distance_adjustment(nearest_enemy_distance: f64) -> i32 {
    if nearest_enemy_distance <= 0.0 {
        0
    } else if nearest_enemy_distance <= 28.0 {
        6
    } else if nearest_enemy_distance <= 40.0 {
        4
    } else if nearest_enemy_distance <= 56.0 {
        2
    } else {
        0
    }
}

/// Predicts time-to-first-rush.
pub fn estimate(
    base_seconds: i32,
    highest_enemy_threat_avg: f64,
    nearest_enemy_distance: f64,
) -> RushEstimate {
    let eta = (base_seconds
        - threat_adjustment(highest_enemy_threat_avg)
        - distance_adjustment(nearest_enemy_distance))
    .clamp(MIN_ETA_SECS, MAX_ETA_SECS);
    RushEstimate {
        eta_seconds: eta,
        risk: RushRisk::from_eta(eta),
    }
}

/// Built-in base rush timings for well-known maps, in seconds.
const KNOWN_MAP_TIMINGS: &[(&str, i32)] = &[
    ("Aquarium", 34),
    ("Archway", 38),
    ("Boletum", 36),
    ("Chained", 40),
    ("Glacier", 35),
    ("Hollow", 33),
    ("Lighthouse", 32),
    ("Lotus", 37),
    ("Pernicious", 34),
    ("Playground", 30),
    ("Waterfall", 39),
];

/// Base rush timing for `map`: configured overrides first, then the built-in
/// table, then `default_secs`. Map names compare case-insensitively.
pub fn base_timing_for_map(
    map: Option<&str>,
    overrides: &HashMap<String, i32>,
    default_secs: i32,
) -> i32 {
    let Some(map) = map else {
        return default_secs;
    };
    overrides
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(map))
        .map(|(_, secs)| *secs)
        .or_else(|| {
            KNOWN_MAP_TIMINGS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(map))
                .map(|(_, secs)| *secs)
        })
        .unwrap_or(default_secs)
}
