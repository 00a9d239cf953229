//! Events delivered by the host.

use serde::{Deserialize, Serialize};

use crate::world::WorldSnapshot;

/// One input to the match runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostEvent {
    /// A raw chat line.
    Chat(String),
    /// A player entity appeared.
    PlayerJoined {
        /// Player name.
        name: String,
        /// Account id, if the host knows it.
        id: Option<String>,
    },
    /// A fresh world snapshot.
    World(Box<WorldSnapshot>),
    /// Periodic timer tick (about 20 per second).
    Tick,
    /// The connection to the server dropped.
    Disconnected,
    /// Turn autoplay on or off, optionally switching mode.
    SetAutoplay {
        /// New state.
        enabled: bool,
        /// New queue mode.
        mode: Option<String>,
    },
    /// Manually blacklist a player.
    BlacklistAdd {
        /// Player name.
        name: String,
        /// Reason shown on join.
        reason: String,
    },
    /// Remove a player from the blacklist.
    BlacklistRemove {
        /// Player name.
        name: String,
    },
}
