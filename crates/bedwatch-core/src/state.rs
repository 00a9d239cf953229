//! The shared session record and its match-phase lifecycle.
//!
//! [`RuntimeState`] is owned by the match runtime and handed by `&mut` to one
//! service at a time. No service keeps its own copy of anything in here.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::BlockPos;
use crate::rush::RushRisk;
use crate::schedule::ActionSchedule;
use crate::stats::{PlayerStats, ThreatLevel};
use crate::world::{BlockKind, ItemKind};

// ---------------------------------------------------------------------------
// MatchPhase
// ---------------------------------------------------------------------------

/// Where the session is in the match lifecycle.
///
/// `Idle → LobbyTracking → InGame → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchPhase {
    /// Not in a match.
    Idle,
    /// In a pre-game lobby, watching joins.
    LobbyTracking,
    /// The match is running.
    InGame,
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "IDLE",
            Self::LobbyTracking => "LOBBY_TRACKING",
            Self::InGame => "IN_GAME",
        })
    }
}

// ---------------------------------------------------------------------------
// BedTracking
// ---------------------------------------------------------------------------

/// Bed knowledge. Exactly one of: nothing known, detection pending, or a
/// committed set of 1–2 blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BedTracking {
    /// No bed information.
    #[default]
    Unknown,
    /// Scanning for the bed; the fallback is committed on timeout.
    Pending {
        /// When tracking started.
        started_at: u64,
        /// When the last scan ran.
        last_attempt_at: u64,
    },
    /// Bed blocks are known.
    Tracked {
        /// Bed block coordinates.
        blocks: BTreeSet<BlockPos>,
        /// The blocks are the spawn fallback, not a detected bed.
        fallback: bool,
    },
}

// ---------------------------------------------------------------------------
// JoinEntry
// ---------------------------------------------------------------------------

/// A recently joined player, shown for a short time after joining.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinEntry {
    /// Player name as first seen.
    pub name: String,
    /// Last join timestamp.
    pub joined_at: u64,
    /// Stats once the fetch completed.
    pub stats: Option<PlayerStats>,
    /// Fetch failure text, set instead of `stats`.
    pub stats_error: Option<String>,
    /// Whether a fetch has been issued and not completed.
    pub fetch_pending: bool,
    /// On the blacklist at join time.
    pub blacklisted: bool,
    /// Blacklist reason, if listed.
    pub blacklist_reason: Option<String>,
    /// Previous encounters with this player.
    pub encounters: u32,
    /// Wins and losses against this player.
    pub win_loss: (u32, u32),
}

impl JoinEntry {
    /// A fresh entry with nothing known yet.
    pub fn new(name: &str, joined_at: u64) -> Self {
        Self {
            name: name.to_string(),
            joined_at,
            stats: None,
            stats_error: None,
            fetch_pending: false,
            blacklisted: false,
            blacklist_reason: None,
            encounters: 0,
            win_loss: (0, 0),
        }
    }

    /// Whether the display TTL has passed.
    pub fn is_expired(&self, now: u64, ttl_ms: u64) -> bool {
        now.saturating_sub(self.joined_at) >= ttl_ms
    }

    /// Threat tier from loaded stats.
    pub fn threat(&self) -> Option<ThreatLevel> {
        self.stats.as_ref().map(PlayerStats::threat_level)
    }

    /// One-line label for the presentation layer.
    pub fn label(&self) -> String {
        let mut out = self.name.clone();
        if self.blacklisted {
            out.push_str(" [BLACKLISTED]");
        }
        match (&self.stats, &self.stats_error) {
            (Some(stats), _) => {
                out.push(' ');
                out.push_str(&stats.summary());
                out.push(' ');
                out.push_str(stats.threat_level().as_str());
            }
            (None, Some(_)) => out.push_str(" [Error]"),
            (None, None) if self.fetch_pending => out.push_str(" ..."),
            (None, None) => {}
        }
        if self.encounters > 0 {
            let (w, l) = self.win_loss;
            out.push_str(&format!(" ({} met, {w}W/{l}L)", self.encounters));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Generators and enemies
// ---------------------------------------------------------------------------

/// The two resource generator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeneratorKind {
    /// Produces diamonds.
    Diamond,
    /// Produces emeralds.
    Emerald,
}

impl GeneratorKind {
    /// Generator kind for a block, if it is one.
    pub fn from_block(block: BlockKind) -> Option<Self> {
        match block {
            BlockKind::DiamondBlock => Some(Self::Diamond),
            BlockKind::EmeraldBlock => Some(Self::Emerald),
            _ => None,
        }
    }

    /// Item this generator drops.
    pub fn item(self) -> ItemKind {
        match self {
            Self::Diamond => ItemKind::Diamond,
            Self::Emerald => ItemKind::Emerald,
        }
    }
}

/// A generator confirmed by the latest scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorEntry {
    /// Generator block.
    pub pos: BlockPos,
    /// Resource kind.
    pub kind: GeneratorKind,
    /// Items currently waiting at the generator.
    pub resource_count: u32,
    /// An item rests directly on top of the block.
    pub item_on_top: bool,
    /// When the entry was last refreshed.
    pub last_update: u64,
}

/// What we have seen an enemy do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedEnemy {
    /// Diamonds attributed to this player.
    pub diamonds: u32,
    /// Emeralds attributed to this player.
    pub emeralds: u32,
    /// Highest armor protection seen.
    pub max_armor: u32,
    /// Distinct held items seen.
    pub held_items: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// Autoplay and rush sub-state
// ---------------------------------------------------------------------------

/// Autoplay loop state.
#[derive(Debug, Default)]
pub struct AutoplayState {
    /// Autoplay is on.
    pub enabled: bool,
    /// Queue mode.
    pub mode: String,
    /// A threat check is due at `check_time`.
    pub pending_check: bool,
    /// When the pending check runs.
    pub check_time: u64,
    /// When the last requeue sequence started.
    pub last_requeue_time: Option<u64>,
    /// Pending steps of the running requeue sequence.
    pub requeue: ActionSchedule,
}

/// Rush predictor state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RushState {
    /// When the predictor last ran.
    pub last_check: Option<u64>,
    /// The warning for this match was already emitted.
    pub warning_sent: bool,
    /// Most recent ETA.
    pub last_eta_seconds: Option<i32>,
    /// Most recent risk label.
    pub last_risk: Option<RushRisk>,
    /// Map name found on the sidebar.
    pub last_detected_map_name: Option<String>,
}

// ---------------------------------------------------------------------------
// RuntimeState
// ---------------------------------------------------------------------------

/// Everything the session knows about the current match.
#[derive(Debug)]
pub struct RuntimeState {
    /// Current phase.
    pub phase: MatchPhase,
    /// Start of the current match (lobby entry, restamped at game start).
    pub match_start_time: Option<u64>,
    /// Start of the teammate spawn-proximity window.
    pub teammate_window_start: Option<u64>,
    /// Ticks handled since the session started.
    pub tick_count: u64,
    /// Bumped on every lobby entry and reset; stale async results carry an older value.
    pub generation: u64,
    /// Bed knowledge.
    pub bed: BedTracking,
    /// Spawn position captured when bed tracking started.
    pub fallback_bed_position: Option<BlockPos>,
    /// Players inferred as teammates by spawn proximity (id or lower-cased name).
    pub inferred_teammate_ids: HashSet<String>,
    /// Last bed-proximity warning per player.
    pub last_bed_warning_time: HashMap<String, u64>,
    /// Last invisible-player alert per player.
    pub last_invisible_alert_time: HashMap<String, u64>,
    /// When the last generator scan ran.
    pub last_generator_scan: Option<u64>,
    /// Generators confirmed by the latest scan.
    pub tracked_generators: BTreeMap<BlockPos, GeneratorEntry>,
    /// Enemy intel keyed by lower-cased name.
    pub tracked_enemies: HashMap<String, TrackedEnemy>,
    /// Recent joins, oldest first.
    pub recent_joins: Vec<JoinEntry>,
    /// Players met during this match (lower-cased), for outcome recording.
    pub encountered: BTreeSet<String>,
    /// Autoplay loop.
    pub autoplay: AutoplayState,
    /// Rush predictor.
    pub rush: RushState,
}

impl RuntimeState {
    /// A fresh idle session.
    pub fn new(autoplay_enabled: bool, autoplay_mode: &str) -> Self {
        Self {
            phase: MatchPhase::Idle,
            match_start_time: None,
            teammate_window_start: None,
            tick_count: 0,
            generation: 0,
            bed: BedTracking::Unknown,
            fallback_bed_position: None,
            inferred_teammate_ids: HashSet::new(),
            last_bed_warning_time: HashMap::new(),
            last_invisible_alert_time: HashMap::new(),
            last_generator_scan: None,
            tracked_generators: BTreeMap::new(),
            tracked_enemies: HashMap::new(),
            recent_joins: Vec::new(),
            encountered: BTreeSet::new(),
            autoplay: AutoplayState {
                enabled: autoplay_enabled,
                mode: autoplay_mode.to_string(),
                ..AutoplayState::default()
            },
            rush: RushState::default(),
        }
    }

    /// Tracked bed blocks (empty unless detection succeeded or the fallback was applied).
    pub fn bed_blocks(&self) -> Vec<BlockPos> {
        match &self.bed {
            BedTracking::Tracked { blocks, .. } => blocks.iter().copied().collect(),
            _ => Vec::new(),
        }
    }

    /// Whether bed detection is still retrying.
    pub fn bed_detection_pending(&self) -> bool {
        matches!(self.bed, BedTracking::Pending { .. })
    }

    /// Whether the tracked bed is the spawn fallback.
    pub fn using_bed_fallback(&self) -> bool {
        matches!(self.bed, BedTracking::Tracked { fallback: true, .. })
    }

    /// Milliseconds since match start, if a match is running.
    pub fn match_elapsed(&self, now: u64) -> Option<u64> {
        self.match_start_time.map(|start| now.saturating_sub(start))
    }

    /// Join entry for `name`, case-insensitive.
    pub fn join_entry_mut(&mut self, name: &str) -> Option<&mut JoinEntry> {
        self.recent_joins
            .iter_mut()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Clears every per-match field: bed tracking, teammate cache, cooldowns,
    /// latches, generators, enemy intel, joins and the encounter set.
    ///
    /// Autoplay enablement, mode and the requeue cooldown survive.
    pub fn reset_match(&mut self) {
        self.generation += 1;
        self.match_start_time = None;
        self.teammate_window_start = None;
        self.bed = BedTracking::Unknown;
        self.fallback_bed_position = None;
        self.inferred_teammate_ids.clear();
        self.last_bed_warning_time.clear();
        self.last_invisible_alert_time.clear();
        self.last_generator_scan = None;
        self.tracked_generators.clear();
        self.tracked_enemies.clear();
        self.recent_joins.clear();
        self.encountered.clear();
        self.autoplay.pending_check = false;
        self.rush = RushState::default();
    }
}
