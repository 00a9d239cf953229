//! Host-supplied world snapshots: players, blocks, dropped items and the
//! scoreboard sidebar.
//!
//! The host delivers a fresh [`WorldSnapshot`] periodically. Everything the
//! services know about the world comes from the latest snapshot; nothing here
//! is mutated by the tracker.

use std::collections::HashMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::geometry::BlockPos;

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// The block kinds the tracker cares about. Everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BlockKind {
    /// Empty space (also returned for unloaded positions).
    #[default]
    Air,
    /// One half of a bed.
    Bed,
    /// Diamond generator block.
    DiamondBlock,
    /// Emerald generator block.
    EmeraldBlock,
    /// Any other block.
    Other,
}

/// Read access to world blocks.
pub trait BlockView {
    /// Block at `pos`; unknown positions read as [`BlockKind::Air`].
    fn block_at(&self, pos: BlockPos) -> BlockKind;
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Dropped item kinds relevant to generator tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// Diamond.
    Diamond,
    /// Emerald.
    Emerald,
    /// Iron ingot.
    Iron,
    /// Gold ingot.
    Gold,
    /// Anything else.
    Other,
}

/// A dropped item stack lying in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEntity {
    /// Item kind.
    pub kind: ItemKind,
    /// Stack size.
    pub count: u32,
    /// Entity position.
    pub position: DVec3,
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// One visible player as seen by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Display name.
    pub name: String,
    /// Stable identity (account id) when known.
    #[serde(default)]
    pub id: Option<String>,
    /// Feet position.
    pub position: DVec3,
    /// Team registry key (e.g. `"RED"`).
    #[serde(default)]
    pub team_key: Option<String>,
    /// Team display name (e.g. `"Red"`).
    #[serde(default)]
    pub team_display: Option<String>,
    /// Native scoreboard team the player belongs to.
    #[serde(default)]
    pub scoreboard_team: Option<String>,
    /// Color code character of the name tag prefix (`c` for `§c`).
    #[serde(default)]
    pub name_color: Option<char>,
    /// Player has the invisibility effect.
    #[serde(default)]
    pub invisible: bool,
    /// Server-controlled bot or NPC, never a real opponent.
    #[serde(default)]
    pub bot: bool,
    /// Total armor protection level.
    #[serde(default)]
    pub armor_protection: u32,
    /// Item currently held in the main hand.
    #[serde(default)]
    pub held_item: Option<String>,
}

impl PlayerSnapshot {
    /// A bare player at `position` with no team information.
    pub fn new(name: impl Into<String>, position: DVec3) -> Self {
        Self {
            name: name.into(),
            id: None,
            position,
            team_key: None,
            team_display: None,
            scoreboard_team: None,
            name_color: None,
            invisible: false,
            bot: false,
            armor_protection: 0,
            held_item: None,
        }
    }

    /// Builder: set the team registry key and display name.
    pub fn with_team(mut self, key: &str, display: &str) -> Self {
        self.team_key = Some(key.to_string());
        self.team_display = Some(display.to_string());
        self
    }

    /// Builder: set the account id.
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Case-insensitive name comparison.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

// ---------------------------------------------------------------------------
// WorldSnapshot
// ---------------------------------------------------------------------------

/// Everything the host reports about the world at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// The local player.
    pub local: PlayerSnapshot,
    /// Other visible players (the local player may also appear here).
    #[serde(default)]
    pub players: Vec<PlayerSnapshot>,
    /// Loaded blocks of interest keyed by position.
    #[serde(default)]
    pub blocks: HashMap<BlockPos, BlockKind>,
    /// Dropped item entities.
    #[serde(default)]
    pub items: Vec<ItemEntity>,
    /// Scoreboard sidebar lines, top to bottom.
    #[serde(default)]
    pub sidebar: Vec<String>,
}

impl WorldSnapshot {
    /// A snapshot containing only the local player.
    pub fn new(local: PlayerSnapshot) -> Self {
        Self {
            local,
            players: Vec::new(),
            blocks: HashMap::new(),
            items: Vec::new(),
            sidebar: Vec::new(),
        }
    }

    /// Position of the local player.
    pub fn local_position(&self) -> DVec3 {
        self.local.position
    }

    /// Every player except the local one.
    pub fn others(&self) -> impl Iterator<Item = &PlayerSnapshot> {
        let local = &self.local;
        self.players
            .iter()
            .filter(move |p| !p.is_named(&local.name))
    }

    /// Local player followed by every other player.
    pub fn all_players(&self) -> impl Iterator<Item = &PlayerSnapshot> {
        std::iter::once(&self.local).chain(self.others())
    }
}

impl BlockView for WorldSnapshot {
    fn block_at(&self, pos: BlockPos) -> BlockKind {
        self.blocks.get(&pos).copied().unwrap_or_default()
    }
}

/// Strips `§x` formatting codes from a string.
pub fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '§' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

/// Best-effort map name from sidebar lines of the form `Map: <name>`.
pub fn map_name_from_sidebar(lines: &[String]) -> Option<String> {
    lines.iter().find_map(|line| {
        let clean = strip_formatting(line);
        let name = clean.trim().strip_prefix("Map:")?.trim();
        (!name.is_empty()).then(|| name.to_string())
    })
}
