//! Player statistics, threat tiers and the stat-provider capability.
//!
//! The tracker never talks to a stats backend directly. It consumes a
//! [`StatsProvider`], whose fetches are non-blocking and report back through a
//! callback on a thread of the provider's choosing.

use std::fmt;
use std::str::FromStr;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ThreatLevel
// ---------------------------------------------------------------------------

/// Ordinal threat classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ThreatLevel {
    /// Casual player.
    Low,
    /// Competent player.
    Medium,
    /// Strong player.
    High,
    /// Top-tier player.
    Extreme,
}

impl ThreatLevel {
    /// Ordinal score used for team aggregation (LOW=1 … EXTREME=4).
    pub fn score(self) -> u32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Extreme => 4,
        }
    }

    /// Upper-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Extreme => "EXTREME",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a threat label cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown threat level {0:?}")]
pub struct ParseThreatLevelError(pub String);

impl FromStr for ThreatLevel {
    type Err = ParseThreatLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "EXTREME" => Ok(Self::Extreme),
            _ => Err(ParseThreatLevelError(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// PlayerStats
// ---------------------------------------------------------------------------

/// Stars at or above which a player is EXTREME.
const EXTREME_STARS: u32 = 500;
/// FKDR at or above which a player is EXTREME.
const EXTREME_FKDR: f64 = 10.0;
const HIGH_STARS: u32 = 300;
const HIGH_FKDR: f64 = 5.0;
const MEDIUM_STARS: u32 = 150;
const MEDIUM_FKDR: f64 = 2.0;

/// Historical performance of one player, as returned by a stats provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Canonical player name.
    pub name: String,
    /// Prestige level.
    pub stars: u32,
    /// Final kills.
    pub final_kills: u32,
    /// Final deaths.
    pub final_deaths: u32,
    /// Wins.
    #[serde(default)]
    pub wins: u32,
    /// Losses.
    #[serde(default)]
    pub losses: u32,
}

impl PlayerStats {
    /// Creates stats with the given stars and final kill/death counts.
    pub fn new(name: &str, stars: u32, final_kills: u32, final_deaths: u32) -> Self {
        Self {
            name: name.to_string(),
            stars,
            final_kills,
            final_deaths,
            wins: 0,
            losses: 0,
        }
    }

    /// Final kill/death ratio; a player with no final deaths counts their kills.
    pub fn fkdr(&self) -> f64 {
        f64::from(self.final_kills) / f64::from(self.final_deaths.max(1))
    }

    /// Individual threat tier.
    ///
    /// These cutoffs are per-player and differ from the
    /// team-average buckets in [`crate::danger::average_threat_label`].
    pub fn threat_level(&self) -> ThreatLevel {
        let fkdr = self.fkdr();
        if self.stars >= EXTREME_STARS || fkdr >= EXTREME_FKDR {
            ThreatLevel::Extreme
        } else if self.stars >= HIGH_STARS || fkdr >= HIGH_FKDR {
            ThreatLevel::High
        } else if self.stars >= MEDIUM_STARS || fkdr >= MEDIUM_FKDR {
            ThreatLevel::Medium
        } else {
            ThreatLevel::Low
        }
    }

    /// Short human-readable summary, e.g. `[512✫] FKDR 12.30`.
    pub fn summary(&self) -> String {
        format!("[{}✫] FKDR {:.2}", self.stars, self.fkdr())
    }
}

// ---------------------------------------------------------------------------
// StatsProvider
// ---------------------------------------------------------------------------

/// Reasons a stat lookup can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatsError {
    /// No API key is configured.
    #[error("no API key configured")]
    NoApiKey,
    /// The provider has no record of the player (nicked or new account).
    #[error("no stats for {0}")]
    NotFound(String),
    /// The provider is throttling requests.
    #[error("rate limited")]
    RateLimited,
    /// Network or decoding failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Completion callback for a stat fetch.
pub type StatsCallback = Box<dyn FnOnce(Result<PlayerStats, StatsError>) + Send + 'static>;

/// Stat lookup capability.
///
/// Fetches never block the caller. Results are keyed case-insensitively by
/// player name.
pub trait StatsProvider: Send + Sync {
    /// Whether the provider has credentials to fetch at all.
    fn has_key(&self) -> bool;

    /// Fetch by name and account id.
    fn fetch_by_identity(&self, name: &str, id: &str, callback: StatsCallback);

    /// Fetch by name only.
    fn fetch_by_name(&self, name: &str, callback: StatsCallback);

    /// Cached stats, if a previous fetch succeeded.
    fn get_cached(&self, name: &str) -> Option<PlayerStats>;

    /// Cached threat tier, if known.
    fn cached_threat(&self, name: &str) -> Option<ThreatLevel> {
        self.get_cached(name).map(|s| s.threat_level())
    }
}

// ---------------------------------------------------------------------------
// MemoryStatsProvider
// ---------------------------------------------------------------------------

/// A provider backed by an in-memory cache. Fetches complete immediately on
/// the calling thread: a cache hit succeeds, a miss fails with
/// [`StatsError::NotFound`].
#[derive(Debug)]
pub struct MemoryStatsProvider {
    cache: DashMap<String, PlayerStats>,
    failures: DashMap<String, StatsError>,
    has_key: bool,
}

impl MemoryStatsProvider {
    /// Creates an empty provider that reports having a key.
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
            failures: DashMap::new(),
            has_key: true,
        }
    }

    /// Creates a provider without credentials (fetches are never issued).
    pub fn without_key() -> Self {
        Self {
            cache: DashMap::new(),
            failures: DashMap::new(),
            has_key: false,
        }
    }

    /// Inserts or replaces cached stats.
    pub fn insert(&self, stats: PlayerStats) {
        let key = stats.name.to_ascii_lowercase();
        self.failures.remove(&key);
        self.cache.insert(key, stats);
    }

    /// Makes every fetch for `name` fail with `error` until stats are inserted.
    pub fn insert_failure(&self, name: &str, error: StatsError) {
        self.failures.insert(name.to_ascii_lowercase(), error);
    }

    fn resolve(&self, name: &str) -> Result<PlayerStats, StatsError> {
        if !self.has_key {
            return Err(StatsError::NoApiKey);
        }
        if let Some(error) = self.failures.get(&name.to_ascii_lowercase()) {
            return Err(error.value().clone());
        }
        self.get_cached(name)
            .ok_or_else(|| StatsError::NotFound(name.to_string()))
    }
}

impl Default for MemoryStatsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsProvider for MemoryStatsProvider {
    fn has_key(&self) -> bool {
        self.has_key
    }

    fn fetch_by_identity(&self, name: &str, _id: &str, callback: StatsCallback) {
        callback(self.resolve(name));
    }

    fn fetch_by_name(&self, name: &str, callback: StatsCallback) {
        callback(self.resolve(name));
    }

    fn get_cached(&self, name: &str) -> Option<PlayerStats> {
        self.cache
            .get(&name.to_ascii_lowercase())
            .map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_threat_tiers_by_stars() {
        assert_eq!(PlayerStats::new("a", 50, 0, 1).threat_level(), ThreatLevel::Low);
        assert_eq!(PlayerStats::new("a", 150, 0, 1).threat_level(), ThreatLevel::Medium);
        assert_eq!(PlayerStats::new("a", 300, 0, 1).threat_level(), ThreatLevel::High);
        assert_eq!(PlayerStats::new("a", 500, 0, 1).threat_level(), ThreatLevel::Extreme);
    }

    #[test]
    fn test_threat_tiers_by_fkdr() {
        assert_eq!(PlayerStats::new("a", 10, 20, 10).threat_level(), ThreatLevel::Medium);
        assert_eq!(PlayerStats::new("a", 10, 50, 10).threat_level(), ThreatLevel::High);
        assert_eq!(PlayerStats::new("a", 10, 100, 10).threat_level(), ThreatLevel::Extreme);
    }

    #[test]
    fn test_fkdr_without_deaths() {
        let stats = PlayerStats::new("a", 0, 7, 0);
        assert!((stats.fkdr() - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_threat_level_ordering_and_scores() {
        assert!(ThreatLevel::Extreme > ThreatLevel::High);
        assert!(ThreatLevel::Medium > ThreatLevel::Low);
        assert_eq!(ThreatLevel::Low.score(), 1);
        assert_eq!(ThreatLevel::Extreme.score(), 4);
    }

    #[test]
    fn test_threat_level_parse() {
        assert_eq!("high".parse::<ThreatLevel>(), Ok(ThreatLevel::High));
        assert_eq!(" EXTREME ".parse::<ThreatLevel>(), Ok(ThreatLevel::Extreme));
        assert!("scary".parse::<ThreatLevel>().is_err());
    }

    #[test]
    fn test_memory_provider_is_case_insensitive() {
        let provider = MemoryStatsProvider::new();
        provider.insert(PlayerStats::new("Steve", 600, 10, 1));
        assert!(provider.get_cached("STEVE").is_some());
        assert_eq!(provider.cached_threat("steve"), Some(ThreatLevel::Extreme));
    }

    #[test]
    fn test_memory_provider_fetch_completes_with_result() {
        let provider = MemoryStatsProvider::new();
        provider.insert(PlayerStats::new("Alex", 100, 1, 1));

        let seen = Arc::new(Mutex::new(Vec::new()));
        for name in ["alex", "ghost"] {
            let sink = Arc::clone(&seen);
            provider.fetch_by_name(
                name,
                Box::new(move |result| sink.lock().unwrap().push(result.is_ok())),
            );
        }
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_injected_failure_until_stats_arrive() {
        let provider = MemoryStatsProvider::new();
        provider.insert_failure("Slow", StatsError::RateLimited);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        provider.fetch_by_name("slow", Box::new(move |r| sink.lock().unwrap().push(r)));

        provider.insert(PlayerStats::new("Slow", 10, 0, 1));
        let sink = Arc::clone(&seen);
        provider.fetch_by_name("SLOW", Box::new(move |r| sink.lock().unwrap().push(r)));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], Err(StatsError::RateLimited));
        assert!(seen[1].is_ok());
    }

    #[test]
    fn test_provider_without_key_fails_fetch() {
        let provider = MemoryStatsProvider::without_key();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        provider.fetch_by_identity(
            "x",
            "id",
            Box::new(move |result| *sink.lock().unwrap() = Some(result)),
        );
        assert!(!provider.has_key());
        assert_eq!(*seen.lock().unwrap(), Some(Err(StatsError::NoApiKey)));
    }
}
