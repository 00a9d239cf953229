//! Bed tracking, bed-proximity warnings and the rush predictor.

use std::collections::BTreeSet;

use bedwatch_config::{BedConfig, Config, TeammateConfig};

use crate::bed::BedLocator;
use crate::danger::TeamDangerAnalyzer;
use crate::geometry::{BlockPos, nearest_block_distance};
use crate::output::{AudioCue, Outbox, Severity};
use crate::rush;
use crate::state::{BedTracking, RuntimeState};
use crate::stats::StatsProvider;
use crate::teammate;
use crate::world::{PlayerSnapshot, WorldSnapshot, map_name_from_sidebar};

/// Whether `other` is on the local player's team, caching spawn inferences
/// in `state`.
pub fn is_teammate(
    state: &mut RuntimeState,
    local: &PlayerSnapshot,
    other: &PlayerSnapshot,
    config: &TeammateConfig,
    now: u64,
) -> bool {
    teammate::classify(
        local,
        other,
        &mut state.inferred_teammate_ids,
        state.teammate_window_start,
        now,
        config,
    )
    .is_some()
}

/// Visible players that are neither teammates nor server bots.
pub fn enemies<'w>(
    state: &mut RuntimeState,
    world: &'w WorldSnapshot,
    config: &TeammateConfig,
    now: u64,
) -> Vec<&'w PlayerSnapshot> {
    world
        .others()
        .filter(|p| !p.bot && !is_teammate(state, &world.local, p, config, now))
        .collect()
}

/// Bed and rush threats for the running match.
pub struct MatchThreatService;

impl MatchThreatService {
    /// Captures the spawn fallback and starts looking for the bed.
    ///
    /// Without map-aware detection the fallback is committed right away;
    /// otherwise detection goes pending and the first attempt runs now.
    pub fn start_bed_tracking(
        state: &mut RuntimeState,
        world: &WorldSnapshot,
        config: &BedConfig,
        now: u64,
    ) {
        let fallback = BlockPos::containing(world.local_position());
        state.fallback_bed_position = Some(fallback);

        if !config.map_aware_detection {
            Self::commit_fallback(state);
            return;
        }

        state.bed = BedTracking::Pending {
            started_at: now,
            last_attempt_at: now,
        };
        Self::detect(state, world, config, now, now);
    }

    /// Retries a pending detection, at most once per retry interval.
    pub fn attempt_bed_detection(
        state: &mut RuntimeState,
        world: &WorldSnapshot,
        config: &BedConfig,
        now: u64,
    ) {
        let BedTracking::Pending {
            started_at,
            last_attempt_at,
        } = state.bed
        else {
            return;
        };
        if now.saturating_sub(last_attempt_at) < config.retry_interval_ms {
            return;
        }
        Self::detect(state, world, config, started_at, now);
    }

    fn detect(
        state: &mut RuntimeState,
        world: &WorldSnapshot,
        config: &BedConfig,
        started_at: u64,
        now: u64,
    ) {
        let origin = BlockPos::containing(world.local_position());
        if let Some(blocks) =
            BedLocator::find_nearest(world, origin, config.scan_horizontal, config.scan_vertical)
        {
            tracing::info!(blocks = ?blocks, "Bed detected");
            state.bed = BedTracking::Tracked {
                blocks,
                fallback: false,
            };
            return;
        }

        if now.saturating_sub(started_at) >= config.retry_timeout_ms {
            Self::commit_fallback(state);
        } else {
            tracing::debug!(origin = %origin, "Bed not found, retrying");
            state.bed = BedTracking::Pending {
                started_at,
                last_attempt_at: now,
            };
        }
    }

    fn commit_fallback(state: &mut RuntimeState) {
        state.bed = match state.fallback_bed_position {
            Some(pos) => {
                tracing::info!(position = %pos, "Using spawn position as bed");
                BedTracking::Tracked {
                    blocks: BTreeSet::from([pos]),
                    fallback: true,
                }
            }
            None => BedTracking::Unknown,
        };
    }

    /// Warns about enemies close to the tracked bed.
    pub fn check_bed_proximity_warnings(
        state: &mut RuntimeState,
        world: &WorldSnapshot,
        config: &Config,
        now: u64,
        out: &mut Outbox,
    ) {
        let bed = state.bed_blocks();
        if bed.is_empty() {
            return;
        }
        let Some(elapsed) = state.match_elapsed(now) else {
            return;
        };
        if elapsed < config.bed.grace_period_ms {
            return;
        }

        for enemy in enemies(state, world, &config.teammates, now) {
            let Some(distance) = nearest_block_distance(enemy.position, &bed) else {
                continue;
            };
            if distance > config.bed.proximity_radius {
                continue;
            }
            let key = enemy.name.to_ascii_lowercase();
            if state
                .last_bed_warning_time
                .get(&key)
                .is_some_and(|last| now.saturating_sub(*last) < config.bed.warning_cooldown_ms)
            {
                continue;
            }
            state.last_bed_warning_time.insert(key, now);
            out.notify(
                Severity::Warning,
                format!("{} is {distance:.1} blocks from your bed", enemy.name),
            );
            out.audio(AudioCue::BedProximity);
        }
    }

    /// Predicts the first rush and warns once per match when it is close.
    pub fn check_rush_risk_predictor(
        state: &mut RuntimeState,
        world: &WorldSnapshot,
        config: &Config,
        stats: &dyn StatsProvider,
        now: u64,
        out: &mut Outbox,
    ) {
        let rush_config = &config.rush;
        if !rush_config.enabled {
            return;
        }
        let Some(elapsed) = state.match_elapsed(now) else {
            return;
        };
        if elapsed > rush_config.active_window_ms {
            return;
        }
        if state
            .rush
            .last_check
            .is_some_and(|last| now.saturating_sub(last) < rush_config.recheck_interval_ms)
        {
            return;
        }
        state.rush.last_check = Some(now);

        let map = map_name_from_sidebar(&world.sidebar);
        let base = rush::base_timing_for_map(
            map.as_deref(),
            &rush_config.map_base_secs,
            rush_config.default_base_secs,
        );

        let summary = TeamDangerAnalyzer::build_summary(
            world.all_players(),
            world.local.team_key.as_deref(),
            stats,
        );
        let threat = TeamDangerAnalyzer::highest_enemy_average(&summary);

        let bed = state.bed_blocks();
        let distance = enemies(state, world, &config.teammates, now)
            .into_iter()
            .filter_map(|p| nearest_block_distance(p.position, &bed))
            .min_by(f64::total_cmp)
            .unwrap_or(-1.0);

        let estimate = rush::estimate(base, threat, distance);
        tracing::debug!(
            map = map.as_deref().unwrap_or("?"),
            base,
            threat,
            distance,
            eta = estimate.eta_seconds,
            risk = %estimate.risk,
            "Rush estimate"
        );

        state.rush.last_eta_seconds = Some(estimate.eta_seconds);
        state.rush.last_risk = Some(estimate.risk);
        if map.is_some() {
            state.rush.last_detected_map_name = map;
        }

        if !state.rush.warning_sent && estimate.eta_seconds <= rush_config.warning_threshold_secs {
            state.rush.warning_sent = true;
            out.notify(
                Severity::Warning,
                format!(
                    "Rush expected in ~{}s ({} risk)",
                    estimate.eta_seconds, estimate.risk
                ),
            );
            out.audio(AudioCue::RushWarning);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec3;

    use super::*;
    use crate::output::RuntimeOutput;
    use crate::rush::RushRisk;
    use crate::state::MatchPhase;
    use crate::stats::{MemoryStatsProvider, PlayerStats};
    use crate::world::BlockKind;

    fn world_at(pos: DVec3) -> WorldSnapshot {
        WorldSnapshot::new(PlayerSnapshot::new("Me", pos).with_team("RED", "Red"))
    }

    fn in_game(now: u64) -> RuntimeState {
        let mut state = RuntimeState::new(false, "fours");
        state.phase = MatchPhase::InGame;
        state.match_start_time = Some(now);
        state
    }

    #[test]
    fn test_detection_disabled_commits_fallback() {
        let config = BedConfig {
            map_aware_detection: false,
            ..BedConfig::default()
        };
        let mut state = in_game(0);
        let world = world_at(DVec3::new(10.5, 64.0, -3.2));

        MatchThreatService::start_bed_tracking(&mut state, &world, &config, 0);

        assert!(!state.bed_detection_pending());
        assert!(state.using_bed_fallback());
        assert_eq!(state.bed_blocks(), vec![BlockPos::new(10, 64, -4)]);
    }

    #[test]
    fn test_detection_finds_bed_on_first_attempt() {
        let mut state = in_game(0);
        let mut world = world_at(DVec3::new(0.5, 64.0, 0.5));
        world.blocks.insert(BlockPos::new(4, 64, 0), BlockKind::Bed);
        world.blocks.insert(BlockPos::new(4, 64, 1), BlockKind::Bed);

        MatchThreatService::start_bed_tracking(&mut state, &world, &BedConfig::default(), 0);

        assert!(!state.bed_detection_pending());
        assert!(!state.using_bed_fallback());
        assert_eq!(
            state.bed_blocks(),
            vec![BlockPos::new(4, 64, 0), BlockPos::new(4, 64, 1)]
        );
    }

    #[test]
    fn test_detection_times_out_to_fallback() {
        let config = BedConfig::default();
        let mut state = in_game(0);
        let spawn = world_at(DVec3::new(0.5, 64.0, 0.5));

        MatchThreatService::start_bed_tracking(&mut state, &spawn, &config, 0);
        assert!(state.bed_detection_pending());

        // The player walks away; the fallback stays the original spawn block.
        let walked = world_at(DVec3::new(100.0, 70.0, 100.0));
        for now in (500..5_000).step_by(500) {
            MatchThreatService::attempt_bed_detection(&mut state, &walked, &config, now);
            assert!(state.bed_detection_pending(), "still pending at {now}");
        }
        MatchThreatService::attempt_bed_detection(&mut state, &walked, &config, 5_000);

        assert!(!state.bed_detection_pending());
        assert!(state.using_bed_fallback());
        assert_eq!(state.bed_blocks(), vec![BlockPos::new(0, 64, 0)]);
    }

    #[test]
    fn test_detection_retries_are_rate_limited() {
        let config = BedConfig::default();
        let mut state = in_game(0);
        let world = world_at(DVec3::ZERO);
        MatchThreatService::start_bed_tracking(&mut state, &world, &config, 0);

        MatchThreatService::attempt_bed_detection(&mut state, &world, &config, 999);
        assert_eq!(
            state.bed,
            BedTracking::Pending {
                started_at: 0,
                last_attempt_at: 0
            }
        );
        MatchThreatService::attempt_bed_detection(&mut state, &world, &config, 1_000);
        assert_eq!(
            state.bed,
            BedTracking::Pending {
                started_at: 0,
                last_attempt_at: 1_000
            }
        );
    }

    fn tracked_bed_state() -> RuntimeState {
        let mut state = in_game(0);
        state.bed = BedTracking::Tracked {
            blocks: BTreeSet::from([BlockPos::new(0, 64, 0)]),
            fallback: false,
        };
        state
    }

    fn warnings(outputs: &[RuntimeOutput]) -> usize {
        outputs
            .iter()
            .filter(|o| matches!(o, RuntimeOutput::Audio(AudioCue::BedProximity)))
            .count()
    }

    #[test]
    fn test_bed_proximity_grace_cooldown_and_filters() {
        let config = Config::default();
        let mut state = tracked_bed_state();
        let mut world = world_at(DVec3::new(0.5, 64.0, 0.5));
        let mut bot = PlayerSnapshot::new("Shopkeeper", DVec3::new(2.0, 64.0, 0.0));
        bot.bot = true;
        world.players = vec![
            PlayerSnapshot::new("Rusher", DVec3::new(10.5, 64.5, 0.5)).with_team("BLUE", "Blue"),
            PlayerSnapshot::new("Mate", DVec3::new(1.0, 64.0, 0.0)).with_team("RED", "Red"),
            PlayerSnapshot::new("Far", DVec3::new(40.0, 64.0, 0.0)).with_team("BLUE", "Blue"),
            bot,
        ];
        let mut out = Outbox::new();

        // Grace period.
        MatchThreatService::check_bed_proximity_warnings(&mut state, &world, &config, 9_999, &mut out);
        assert_eq!(warnings(out.outputs()), 0);

        MatchThreatService::check_bed_proximity_warnings(&mut state, &world, &config, 10_000, &mut out);
        assert_eq!(warnings(out.outputs()), 1);
        let text = out.outputs()[0].to_string();
        assert!(text.contains("Rusher"), "{text}");

        // Cooldown.
        MatchThreatService::check_bed_proximity_warnings(&mut state, &world, &config, 14_999, &mut out);
        assert_eq!(warnings(out.outputs()), 1);
        MatchThreatService::check_bed_proximity_warnings(&mut state, &world, &config, 15_000, &mut out);
        assert_eq!(warnings(out.outputs()), 2);
    }

    #[test]
    fn test_no_proximity_warning_without_bed() {
        let config = Config::default();
        let mut state = in_game(0);
        let mut world = world_at(DVec3::ZERO);
        world.players = vec![PlayerSnapshot::new("Rusher", DVec3::X)];
        let mut out = Outbox::new();
        MatchThreatService::check_bed_proximity_warnings(&mut state, &world, &config, 60_000, &mut out);
        assert!(out.outputs().is_empty());
    }

    fn rush_world(stats: &MemoryStatsProvider) -> WorldSnapshot {
        // Blue averages (4 + 3 + 3) / 3 = 3.33, nearest blue 25 blocks out.
        for (name, stars) in [("b1", 600), ("b2", 350), ("b3", 350)] {
            stats.insert(PlayerStats::new(name, stars, 0, 1));
        }
        let mut world = world_at(DVec3::new(0.5, 64.0, 0.5));
        world.sidebar = vec!["Map: Nowhere".to_string()];
        world.players = vec![
            PlayerSnapshot::new("b1", DVec3::new(25.5, 64.5, 0.5)).with_team("BLUE", "Blue"),
            PlayerSnapshot::new("b2", DVec3::new(60.0, 64.0, 0.0)).with_team("BLUE", "Blue"),
            PlayerSnapshot::new("b3", DVec3::new(70.0, 64.0, 0.0)).with_team("BLUE", "Blue"),
        ];
        world
    }

    #[test]
    fn test_rush_predictor_warns_once() {
        let stats = MemoryStatsProvider::new();
        let world = rush_world(&stats);
        let config = Config::default();
        let mut state = tracked_bed_state();
        let mut out = Outbox::new();

        MatchThreatService::check_rush_risk_predictor(&mut state, &world, &config, &stats, 1_000, &mut out);
        assert_eq!(state.rush.last_eta_seconds, Some(22));
        assert_eq!(state.rush.last_risk, Some(RushRisk::Medium));
        assert_eq!(state.rush.last_detected_map_name.as_deref(), Some("Nowhere"));
        assert!(state.rush.warning_sent);
        assert_eq!(out.drain().len(), 2);

        // Rate limited, then latched.
        MatchThreatService::check_rush_risk_predictor(&mut state, &world, &config, &stats, 2_000, &mut out);
        assert_eq!(state.rush.last_check, Some(1_000));
        MatchThreatService::check_rush_risk_predictor(&mut state, &world, &config, &stats, 3_000, &mut out);
        assert_eq!(state.rush.last_check, Some(3_000));
        assert!(out.outputs().is_empty());
    }

    #[test]
    fn test_rush_predictor_inactive_after_window() {
        let stats = MemoryStatsProvider::new();
        let world = rush_world(&stats);
        let config = Config::default();
        let mut state = tracked_bed_state();
        let mut out = Outbox::new();

        MatchThreatService::check_rush_risk_predictor(&mut state, &world, &config, &stats, 90_001, &mut out);
        assert_eq!(state.rush.last_check, None);
        assert!(out.outputs().is_empty());
    }
}
