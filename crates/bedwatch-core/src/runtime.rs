//! The single-writer match runtime.
//!
//! [`MatchRuntime`] owns the [`RuntimeState`] and is the only thing that
//! mutates it. Every host event goes through [`MatchRuntime::handle`], which
//! returns the side effects it produced. Stat fetch results are queued by
//! their callbacks and applied at the start and end of each event.

use std::sync::Arc;

use bedwatch_config::Config;
use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::{Deserialize, Serialize};

use crate::blacklist::AutoBlacklistManager;
use crate::danger::{TeamDangerAnalyzer, TeamDangerEntry};
use crate::event::HostEvent;
use crate::geometry::BlockPos;
use crate::history::{Outcome, PlayerHistoryStore};
use crate::lobby::{JoinContext, LobbyTrackerService, StatsCompletion};
use crate::markers::{self, ChatSignal};
use crate::output::{Outbox, RuntimeOutput, Severity};
use crate::rush::RushRisk;
use crate::scan::WorldScanService;
use crate::state::{AutoplayState, BedTracking, GeneratorEntry, MatchPhase, RuntimeState};
use crate::stats::StatsProvider;
use crate::threat::MatchThreatService;
use crate::world::WorldSnapshot;

/// What a presentation layer polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSnapshot {
    /// Current phase.
    pub phase: MatchPhase,
    /// Tracked bed blocks.
    pub bed_blocks: Vec<BlockPos>,
    /// The bed is the spawn fallback.
    pub using_bed_fallback: bool,
    /// Bed detection is still retrying.
    pub bed_detection_pending: bool,
    /// Latest rush ETA.
    pub rush_eta_seconds: Option<i32>,
    /// Latest rush risk.
    pub rush_risk: Option<RushRisk>,
    /// Map name from the sidebar.
    pub map_name: Option<String>,
    /// Tracked generators.
    pub generators: Vec<GeneratorEntry>,
    /// Team danger, strongest first.
    pub team_danger: Vec<TeamDangerEntry>,
    /// Recent join labels, oldest first.
    pub recent_joins: Vec<String>,
    /// Autoplay is on.
    pub autoplay_enabled: bool,
}

impl Default for RuntimeSnapshot {
    fn default() -> Self {
        Self {
            phase: MatchPhase::Idle,
            bed_blocks: Vec::new(),
            using_bed_fallback: false,
            bed_detection_pending: false,
            rush_eta_seconds: None,
            rush_risk: None,
            map_name: None,
            generators: Vec::new(),
            team_danger: Vec::new(),
            recent_joins: Vec::new(),
            autoplay_enabled: false,
        }
    }
}

/// Owns the session record and routes host events through the services.
pub struct MatchRuntime {
    config: Config,
    stats: Arc<dyn StatsProvider>,
    history: Arc<dyn PlayerHistoryStore>,
    state: RuntimeState,
    world: Option<WorldSnapshot>,
    completions_tx: Sender<StatsCompletion>,
    completions_rx: Receiver<StatsCompletion>,
}

impl MatchRuntime {
    /// Creates an idle runtime.
    pub fn new(
        config: Config,
        stats: Arc<dyn StatsProvider>,
        history: Arc<dyn PlayerHistoryStore>,
    ) -> Self {
        let (completions_tx, completions_rx) = unbounded();
        let state = RuntimeState::new(config.autoplay.enabled, &config.autoplay.mode);
        Self {
            config,
            stats,
            history,
            state,
            world: None,
            completions_tx,
            completions_rx,
        }
    }

    /// Read-only view of the session record.
    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Swaps in a reloaded configuration. Autoplay state is left alone.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// Handles one host event at `now` (Unix milliseconds).
    pub fn handle(&mut self, event: HostEvent, now: u64) -> Vec<RuntimeOutput> {
        let mut out = Outbox::new();
        self.drain_completions(&mut out);

        match event {
            HostEvent::Chat(line) => {
                if let Some(signal) = markers::classify(&line) {
                    self.on_signal(signal, now, &mut out);
                }
            }
            HostEvent::PlayerJoined { name, id } => {
                if self.state.phase == MatchPhase::LobbyTracking {
                    self.track_join(&name, id.as_deref(), now, &mut out);
                }
            }
            HostEvent::World(world) => self.on_world(*world, now),
            HostEvent::Tick => self.tick(now, &mut out),
            HostEvent::Disconnected => {
                self.state.autoplay.requeue.cancel();
                if self.state.phase != MatchPhase::Idle {
                    self.finish_match(Outcome::Unknown, now, &mut out);
                }
            }
            HostEvent::SetAutoplay { enabled, mode } => {
                self.set_autoplay(enabled, mode, now, &mut out);
            }
            HostEvent::BlacklistAdd { name, reason } => {
                self.history.add_manual(&name, &reason, now);
                if let Some(entry) = self.state.join_entry_mut(&name) {
                    entry.blacklisted = true;
                    entry.blacklist_reason = Some(reason.clone());
                }
                out.notify(Severity::Info, format!("Blacklisted {name}: {reason}"));
            }
            HostEvent::BlacklistRemove { name } => {
                let removed = self.history.remove(&name).is_some();
                if let Some(entry) = self.state.join_entry_mut(&name) {
                    entry.blacklisted = false;
                    entry.blacklist_reason = None;
                }
                if removed {
                    out.notify(Severity::Info, format!("Removed {name} from the blacklist"));
                } else {
                    out.notify(Severity::Info, format!("{name} is not blacklisted"));
                }
            }
        }

        self.drain_completions(&mut out);
        out.drain()
    }

    /// Current presentation snapshot.
    pub fn snapshot(&self) -> RuntimeSnapshot {
        let state = &self.state;
        let team_danger = self
            .world
            .as_ref()
            .map(|world| {
                TeamDangerAnalyzer::build_summary(
                    world.all_players(),
                    world.local.team_key.as_deref(),
                    self.stats.as_ref(),
                )
            })
            .unwrap_or_default();

        RuntimeSnapshot {
            phase: state.phase,
            bed_blocks: state.bed_blocks(),
            using_bed_fallback: state.using_bed_fallback(),
            bed_detection_pending: state.bed_detection_pending(),
            rush_eta_seconds: state.rush.last_eta_seconds,
            rush_risk: state.rush.last_risk,
            map_name: state.rush.last_detected_map_name.clone(),
            generators: state.tracked_generators.values().cloned().collect(),
            team_danger,
            recent_joins: state.recent_joins.iter().map(|e| e.label()).collect(),
            autoplay_enabled: state.autoplay.enabled,
        }
    }

    fn drain_completions(&mut self, out: &mut Outbox) {
        while let Ok(completion) = self.completions_rx.try_recv() {
            LobbyTrackerService::apply_completion(&mut self.state, completion, out);
        }
    }

    fn on_signal(&mut self, signal: ChatSignal, now: u64, out: &mut Outbox) {
        match signal {
            ChatSignal::LobbyEntry => self.enter_lobby(now, out),
            ChatSignal::LobbyJoin { name } => {
                if self.state.phase == MatchPhase::Idle {
                    self.enter_lobby(now, out);
                }
                if self.state.phase == MatchPhase::LobbyTracking {
                    self.track_join(&name, None, now, out);
                }
            }
            ChatSignal::GameStart => self.start_game(now, out),
            ChatSignal::Victory => self.end_match(Outcome::Win, now, out),
            ChatSignal::Defeat | ChatSignal::SelfEliminated => {
                self.end_match(Outcome::Loss, now, out)
            }
            ChatSignal::FinalKill { victim } => {
                if self
                    .state
                    .tracked_enemies
                    .remove(&victim.to_ascii_lowercase())
                    .is_some()
                {
                    tracing::debug!(player = %victim, "Enemy eliminated");
                }
            }
            ChatSignal::BedDestroyed { own } => {
                if own && self.state.phase == MatchPhase::InGame {
                    self.state.bed = BedTracking::Unknown;
                    out.notify(Severity::Danger, "Your bed was destroyed");
                    tracing::info!("Own bed destroyed");
                }
            }
        }
    }

    fn end_match(&mut self, outcome: Outcome, now: u64, out: &mut Outbox) {
        if self.state.phase != MatchPhase::Idle {
            self.finish_match(outcome, now, out);
        }
    }

    fn enter_lobby(&mut self, now: u64, out: &mut Outbox) {
        match self.state.phase {
            MatchPhase::LobbyTracking => return,
            MatchPhase::InGame => self.finish_match(Outcome::Unknown, now, out),
            MatchPhase::Idle => {}
        }

        self.state.reset_match();
        self.state.phase = MatchPhase::LobbyTracking;
        self.state.match_start_time = Some(now);
        self.state.teammate_window_start = Some(now);

        if let Some(world) = &self.world {
            MatchThreatService::start_bed_tracking(&mut self.state, world, &self.config.bed, now);
        }
        if self.state.autoplay.enabled {
            self.schedule_autoplay_check(now);
        }
        tracing::info!(generation = self.state.generation, "Entered lobby");
    }

    fn start_game(&mut self, now: u64, out: &mut Outbox) {
        match self.state.phase {
            MatchPhase::InGame => return,
            MatchPhase::Idle => self.enter_lobby(now, out),
            MatchPhase::LobbyTracking => {}
        }

        let state = &mut self.state;
        state.phase = MatchPhase::InGame;
        state.match_start_time = Some(now);
        state.teammate_window_start = Some(now);
        // Lobby-time proximity says nothing about the spawn teams.
        state.inferred_teammate_ids.clear();
        state.autoplay.pending_check = false;
        state.bed = BedTracking::Unknown;
        if let Some(world) = &self.world {
            MatchThreatService::start_bed_tracking(state, world, &self.config.bed, now);
        }
        tracing::info!(generation = state.generation, "Match started");
    }

    fn finish_match(&mut self, outcome: Outcome, now: u64, out: &mut Outbox) {
        let players = std::mem::take(&mut self.state.encountered);
        for player in &players {
            self.history.record_encounter(player, outcome, now);
        }

        let listed = AutoBlacklistManager::evaluate(
            &players,
            self.history.as_ref(),
            &self.config.blacklist,
            now,
        );
        for name in &listed {
            out.notify(Severity::Warning, format!("{name} was auto-blacklisted"));
        }

        tracing::info!(
            %outcome,
            players = players.len(),
            auto_blacklisted = listed.len(),
            "Match finished"
        );
        out.notify(
            Severity::Info,
            format!("Match over ({outcome}), {} players recorded", players.len()),
        );

        self.state.reset_match();
        self.state.phase = MatchPhase::Idle;
    }

    fn track_join(&mut self, name: &str, id: Option<&str>, now: u64, out: &mut Outbox) {
        if self.world.as_ref().is_some_and(|w| w.local.is_named(name)) {
            return;
        }
        let ctx = JoinContext {
            stats: self.stats.as_ref(),
            history: self.history.as_ref(),
            completions: &self.completions_tx,
        };
        LobbyTrackerService::track_player_join(&mut self.state, &ctx, name, id, now, out);
    }

    fn on_world(&mut self, world: WorldSnapshot, now: u64) {
        let needs_bed = self.state.phase != MatchPhase::Idle
            && self.state.bed == BedTracking::Unknown
            && self.state.fallback_bed_position.is_none();
        if needs_bed {
            MatchThreatService::start_bed_tracking(&mut self.state, &world, &self.config.bed, now);
        }
        self.world = Some(world);
    }

    fn set_autoplay(&mut self, enabled: bool, mode: Option<String>, now: u64, out: &mut Outbox) {
        let autoplay = &mut self.state.autoplay;
        if let Some(mode) = mode {
            autoplay.mode = mode;
        }
        autoplay.enabled = enabled;

        if enabled {
            out.notify(
                Severity::Info,
                format!("Autoplay enabled ({})", autoplay.mode),
            );
            if self.state.phase == MatchPhase::LobbyTracking {
                self.schedule_autoplay_check(now);
            }
        } else {
            let dropped = autoplay.requeue.cancel();
            autoplay.pending_check = false;
            if dropped > 0 {
                tracing::debug!(dropped, "Requeue cancelled");
            }
            out.notify(Severity::Info, "Autoplay disabled");
        }
    }

    fn schedule_autoplay_check(&mut self, now: u64) {
        self.state.autoplay.pending_check = true;
        self.state.autoplay.check_time = now + self.config.autoplay.check_delay_ms;
    }

    fn tick(&mut self, now: u64, out: &mut Outbox) {
        let config = &self.config;
        let stats = self.stats.as_ref();
        let world = self.world.as_ref();
        let state = &mut self.state;
        state.tick_count += 1;

        LobbyTrackerService::trim_recent_joins(state, config.tracker.join_display_ttl_ms, now);

        // Order matters: later checks read what earlier ones resolved.
        if let Some(world) = world {
            MatchThreatService::attempt_bed_detection(state, world, &config.bed, now);
            if state.phase == MatchPhase::InGame {
                MatchThreatService::check_rush_risk_predictor(state, world, config, stats, now, out);
                WorldScanService::check_invisible_players(state, world, &config.scan, now, out);
                WorldScanService::scan_generators(state, world, config, now);
                MatchThreatService::check_bed_proximity_warnings(state, world, config, now, out);
            }
        }

        if state.autoplay.pending_check && now >= state.autoplay.check_time {
            WorldScanService::perform_autoplay_check(state, world, stats, config, now, out);
        }

        let AutoplayState {
            enabled, requeue, ..
        } = &mut state.autoplay;
        for action in requeue.poll(now, || *enabled) {
            tracing::info!(%action, "Requeue step");
            out.action(action);
        }
    }
}
