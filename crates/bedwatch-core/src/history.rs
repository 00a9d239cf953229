//! Encounter history and blacklist capability.
//!
//! The store is shared with other parts of the host and may be written by
//! them at any time; the tracker never assumes exclusive access. All
//! timestamps are Unix milliseconds and all keys are case-insensitive.

use std::fmt;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Milliseconds in one hour.
pub const HOUR_MS: u64 = 60 * 60 * 1_000;

/// Milliseconds in one day.
pub const DAY_MS: u64 = 24 * HOUR_MS;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of a match from the local player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// Local player's team won.
    Win,
    /// Local player lost or was eliminated.
    Loss,
    /// Match ended without a known result (disconnect, requeue).
    Unknown,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Win => "WIN",
            Self::Loss => "LOSS",
            Self::Unknown => "UNKNOWN",
        })
    }
}

// ---------------------------------------------------------------------------
// Blacklist entries
// ---------------------------------------------------------------------------

/// Who created a blacklist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlacklistSource {
    /// Added by the user. Never touched by automatic policy.
    Manual,
    /// Added by the auto-blacklist policy.
    Auto,
}

/// One blacklisted player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    /// Lower-cased player name.
    pub player: String,
    /// Why the player was listed.
    pub reason: String,
    /// Who listed the player.
    pub source: BlacklistSource,
    /// When the entry was first created.
    pub added_at: u64,
    /// When the entry expires (0 = never).
    pub expires_at: u64,
    /// When automatic policy last (re-)added the entry (0 = never).
    pub last_auto_add_at: u64,
}

impl BlacklistEntry {
    /// Whether the entry has expired at `now`.
    ///
    /// Only automatic entries expire.
    pub fn is_expired(&self, now: u64) -> bool {
        self.source == BlacklistSource::Auto && self.expires_at > 0 && now >= self.expires_at
    }
}

/// A single recorded encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encounter {
    /// How the match ended.
    pub outcome: Outcome,
    /// When the match ended.
    pub at: u64,
}

// ---------------------------------------------------------------------------
// PlayerHistoryStore
// ---------------------------------------------------------------------------

/// Blacklist and encounter history capability.
pub trait PlayerHistoryStore: Send + Sync {
    /// Blacklist lookup. Expired automatic entries are purged and read as absent.
    fn blacklist_entry(&self, player: &str, now: u64) -> Option<BlacklistEntry>;

    /// Adds or replaces a manual entry.
    fn add_manual(&self, player: &str, reason: &str, now: u64);

    /// Adds or refreshes an automatic entry. Returns `false` (and changes
    /// nothing) when a manual entry exists.
    fn add_auto(&self, player: &str, reason: &str, expires_at: u64, now: u64) -> bool;

    /// Removes any entry for the player.
    fn remove(&self, player: &str) -> Option<BlacklistEntry>;

    /// Records one finished match against `player`.
    fn record_encounter(&self, player: &str, outcome: Outcome, now: u64);

    /// Total encounters with `player`.
    fn encounter_count(&self, player: &str) -> u32;

    /// Wins and losses against `player`.
    fn win_loss(&self, player: &str) -> (u32, u32);

    /// Encounters with `outcome` against `player` in the last `days` days.
    fn count_outcome_within(&self, player: &str, outcome: Outcome, days: u64, now: u64) -> u32;
}

// ---------------------------------------------------------------------------
// MemoryHistoryStore
// ---------------------------------------------------------------------------

/// Concurrent in-memory [`PlayerHistoryStore`].
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    blacklist: DashMap<String, BlacklistEntry>,
    encounters: DashMap<String, Vec<Encounter>>,
}

fn key(player: &str) -> String {
    player.to_ascii_lowercase()
}

impl MemoryHistoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blacklist entries, including not-yet-purged expired ones.
    pub fn blacklist_len(&self) -> usize {
        self.blacklist.len()
    }
}

impl PlayerHistoryStore for MemoryHistoryStore {
    fn blacklist_entry(&self, player: &str, now: u64) -> Option<BlacklistEntry> {
        let key = key(player);
        // Purge under the shard lock so a concurrent refresh is not lost.
        if self
            .blacklist
            .remove_if(&key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            tracing::debug!(player = %key, "Expired auto-blacklist entry purged");
            return None;
        }
        self.blacklist.get(&key).map(|entry| entry.value().clone())
    }

    fn add_manual(&self, player: &str, reason: &str, now: u64) {
        let key = key(player);
        self.blacklist.insert(
            key.clone(),
            BlacklistEntry {
                player: key,
                reason: reason.to_string(),
                source: BlacklistSource::Manual,
                added_at: now,
                expires_at: 0,
                last_auto_add_at: 0,
            },
        );
    }

    fn add_auto(&self, player: &str, reason: &str, expires_at: u64, now: u64) -> bool {
        let key = key(player);
        let mut slot = self
            .blacklist
            .entry(key.clone())
            .or_insert_with(|| BlacklistEntry {
                player: key,
                reason: String::new(),
                source: BlacklistSource::Auto,
                added_at: now,
                expires_at,
                last_auto_add_at: now,
            });
        let entry = slot.value_mut();
        if entry.source == BlacklistSource::Manual {
            return false;
        }
        if entry.is_expired(now) {
            entry.added_at = now;
        }
        entry.reason = reason.to_string();
        entry.expires_at = expires_at;
        entry.last_auto_add_at = now;
        true
    }

    fn remove(&self, player: &str) -> Option<BlacklistEntry> {
        self.blacklist.remove(&key(player)).map(|(_, entry)| entry)
    }

    fn record_encounter(&self, player: &str, outcome: Outcome, now: u64) {
        self.encounters
            .entry(key(player))
            .or_default()
            .push(Encounter { outcome, at: now });
    }

    fn encounter_count(&self, player: &str) -> u32 {
        self.encounters
            .get(&key(player))
            .map_or(0, |list| list.len() as u32)
    }

    fn win_loss(&self, player: &str) -> (u32, u32) {
        let Some(list) = self.encounters.get(&key(player)) else {
            return (0, 0);
        };
        list.iter().fold((0, 0), |(w, l), e| match e.outcome {
            Outcome::Win => (w + 1, l),
            Outcome::Loss => (w, l + 1),
            Outcome::Unknown => (w, l),
        })
    }

    fn count_outcome_within(&self, player: &str, outcome: Outcome, days: u64, now: u64) -> u32 {
        let since = now.saturating_sub(days.saturating_mul(DAY_MS));
        self.encounters.get(&key(player)).map_or(0, |list| {
            list.iter()
                .filter(|e| e.outcome == outcome && e.at >= since)
                .count() as u32
        })
    }
}
