//! Match tracking core: lobby joins, bed and rush threats, generators,
//! autoplay and the automatic blacklist.
//!
//! Everything that mutates match state runs inside [`MatchRuntime`]; the
//! [`session`] module wraps it in a tokio actor.

pub mod bed;
pub mod blacklist;
pub mod danger;
pub mod event;
pub mod geometry;
pub mod history;
pub mod lobby;
pub mod markers;
pub mod output;
pub mod runtime;
pub mod rush;
pub mod scan;
pub mod schedule;
pub mod session;
pub mod state;
pub mod stats;
pub mod teammate;
pub mod threat;
pub mod world;

pub use bed::BedLocator;
pub use blacklist::AutoBlacklistManager;
pub use danger::{TeamDangerAnalyzer, TeamDangerEntry, average_threat_label};
pub use event::HostEvent;
pub use geometry::BlockPos;
pub use history::{
    BlacklistEntry, BlacklistSource, MemoryHistoryStore, Outcome, PlayerHistoryStore,
};
pub use lobby::{LobbyTrackerService, StatsCompletion};
pub use markers::ChatSignal;
pub use output::{AudioCue, Notification, OutgoingAction, RuntimeOutput, Severity};
pub use runtime::{MatchRuntime, RuntimeSnapshot};
pub use rush::{RushEstimate, RushRisk, estimate};
pub use scan::WorldScanService;
pub use schedule::ActionSchedule;
pub use session::{SessionConfig, SessionError, SessionHandle, spawn_session};
pub use state::{JoinEntry, MatchPhase, RuntimeState};
pub use stats::{
    MemoryStatsProvider, PlayerStats, StatsCallback, StatsError, StatsProvider, ThreatLevel,
};
pub use teammate::{Confidence, TeammateSignal};
pub use threat::MatchThreatService;
pub use world::{BlockKind, ItemEntity, ItemKind, PlayerSnapshot, WorldSnapshot};
