//! Generator tracking, enemy intel, invisible players and autoplay.

use std::collections::BTreeMap;

use bedwatch_config::{AutoplayConfig, Config, ScanConfig};
use glam::DVec3;

use crate::geometry::BlockPos;
use crate::output::{AudioCue, Outbox, OutgoingAction, Severity};
use crate::state::{GeneratorEntry, GeneratorKind, MatchPhase, RuntimeState};
use crate::stats::{StatsProvider, ThreatLevel};
use crate::threat::{enemies, is_teammate};
use crate::world::{ItemEntity, ItemKind, PlayerSnapshot, WorldSnapshot};

/// Server game id for an autoplay mode. Unknown modes are passed through.
pub fn queue_game(mode: &str) -> String {
    match mode.to_ascii_lowercase().as_str() {
        "solo" => "bedwars_eight_one",
        "doubles" => "bedwars_eight_two",
        "threes" => "bedwars_four_three",
        "fours" => "bedwars_four_four",
        "4v4" => "bedwars_two_four",
        _ => mode,
    }
    .to_string()
}

/// Periodic world scans and the autoplay loop.
pub struct WorldScanService;

impl WorldScanService {
    /// Re-scans generators around the player, at most once per interval.
    ///
    /// Only generators seen this pass stay tracked. A drop in a generator's
    /// item count is credited to the nearest enemy within pickup range, and
    /// every visible enemy's armor and held item are recorded.
    pub fn scan_generators(
        state: &mut RuntimeState,
        world: &WorldSnapshot,
        config: &Config,
        now: u64,
    ) {
        let scan = &config.scan;
        if state
            .last_generator_scan
            .is_some_and(|last| now.saturating_sub(last) < scan.generator_interval_ms)
        {
            return;
        }
        state.last_generator_scan = Some(now);

        let enemies = enemies(state, world, &config.teammates, now);
        for enemy in &enemies {
            let intel = state
                .tracked_enemies
                .entry(enemy.name.to_ascii_lowercase())
                .or_default();
            intel.max_armor = intel.max_armor.max(enemy.armor_protection);
            if let Some(item) = &enemy.held_item {
                intel.held_items.insert(item.clone());
            }
        }

        let origin = BlockPos::containing(world.local_position());
        let mut seen = BTreeMap::new();
        for (pos, block) in &world.blocks {
            let Some(kind) = GeneratorKind::from_block(*block) else {
                continue;
            };
            if (pos.x - origin.x).abs() > scan.horizontal_radius
                || (pos.z - origin.z).abs() > scan.horizontal_radius
                || (pos.y - origin.y).abs() > scan.vertical_radius
            {
                continue;
            }

            let item = kind.item();
            let resource_count = count_items_near(&world.items, *pos, item, scan.count_tolerance);
            let item_on_top = item_on_top(&world.items, *pos, item, scan);

            if let Some(previous) = state.tracked_generators.get(pos)
                && resource_count < previous.resource_count
            {
                let taken = previous.resource_count - resource_count;
                credit_pickup(state, &enemies, *pos, kind, taken, scan.pickup_radius);
            }

            seen.insert(
                *pos,
                GeneratorEntry {
                    pos: *pos,
                    kind,
                    resource_count,
                    item_on_top,
                    last_update: now,
                },
            );
        }

        let evicted = state
            .tracked_generators
            .keys()
            .filter(|pos| !seen.contains_key(pos))
            .count();
        if evicted > 0 {
            tracing::debug!(evicted, "Generators left scan range");
        }
        state.tracked_generators = seen;
    }

    /// Alerts about invisible players nearby, teammates included.
    pub fn check_invisible_players(
        state: &mut RuntimeState,
        world: &WorldSnapshot,
        config: &ScanConfig,
        now: u64,
        out: &mut Outbox,
    ) {
        let origin = world.local_position();
        for player in world.others().filter(|p| p.invisible && !p.bot) {
            let distance = player.position.distance(origin);
            if distance > config.invisible_radius {
                continue;
            }
            let key = player.name.to_ascii_lowercase();
            if state
                .last_invisible_alert_time
                .get(&key)
                .is_some_and(|last| now.saturating_sub(*last) < config.invisible_cooldown_ms)
            {
                continue;
            }
            state.last_invisible_alert_time.insert(key, now);
            out.notify(
                Severity::Warning,
                format!("Invisible player {} {distance:.0} blocks away", player.name),
            );
            out.audio(AudioCue::InvisiblePlayer);
        }
    }

    /// Decides whether to stay in the current lobby.
    ///
    /// Every other player with cached stats at or above the configured tier
    /// counts as a threat. Teammate threats are only reported. Any enemy
    /// threat requeues (or, with requeue off, stops autoplay and stays). A
    /// clean lobby ends autoplay.
    pub fn perform_autoplay_check(
        state: &mut RuntimeState,
        world: Option<&WorldSnapshot>,
        stats: &dyn StatsProvider,
        config: &Config,
        now: u64,
        out: &mut Outbox,
    ) {
        state.autoplay.pending_check = false;
        if !state.autoplay.enabled {
            return;
        }

        let ceiling = config
            .autoplay
            .max_threat
            .parse::<ThreatLevel>()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "Invalid autoplay threat tier, using HIGH");
                ThreatLevel::High
            });

        // Visible players first, then joins not (yet) in view.
        let mut candidates: Vec<(String, Option<&PlayerSnapshot>)> = Vec::new();
        if let Some(world) = world {
            candidates.extend(world.others().map(|p| (p.name.clone(), Some(p))));
        }
        for name in &state.encountered {
            let local = world.is_some_and(|w| w.local.is_named(name));
            if !local && !candidates.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)) {
                candidates.push((name.clone(), None));
            }
        }

        let mut teammate_threats = Vec::new();
        let mut enemy_threats = Vec::new();
        for (name, snapshot) in candidates {
            let Some(threat) = stats.cached_threat(&name) else {
                continue;
            };
            if threat < ceiling {
                continue;
            }
            let teammate = match (world, snapshot) {
                (Some(world), Some(player)) => {
                    is_teammate(state, &world.local, player, &config.teammates, now)
                }
                _ => false,
            };
            let label = format!("{name} ({threat})");
            if teammate {
                teammate_threats.push(label);
            } else {
                enemy_threats.push(label);
            }
        }

        if !teammate_threats.is_empty() {
            out.notify(
                Severity::Info,
                format!("Teammate threats: {}", teammate_threats.join(", ")),
            );
        }

        if enemy_threats.is_empty() {
            state.autoplay.enabled = false;
            out.notify(Severity::Info, "No threats in lobby, autoplay stopped");
            tracing::info!("Autoplay finished, lobby is clean");
            return;
        }

        let list = enemy_threats.join(", ");
        if config.autoplay.requeue_on_threat {
            if Self::requeue_autoplay(state, &config.autoplay, now, out) {
                out.notify(Severity::Warning, format!("Enemy threats: {list}, requeueing"));
            } else {
                // Look again once the cooldown allows a requeue.
                let retry_at = state
                    .autoplay
                    .last_requeue_time
                    .map_or(now, |last| last + config.autoplay.requeue_cooldown_ms);
                state.autoplay.pending_check = true;
                state.autoplay.check_time = retry_at.max(now);
                out.notify(
                    Severity::Info,
                    format!("Enemy threats: {list}, requeue on cooldown"),
                );
            }
        } else {
            state.autoplay.enabled = false;
            out.notify(
                Severity::Warning,
                format!("Enemy threats: {list}, staying (autoplay stopped)"),
            );
        }
    }

    /// Leaves the match and schedules the way back into a queue.
    ///
    /// Returns `false` when the requeue cooldown has not elapsed.
    pub fn requeue_autoplay(
        state: &mut RuntimeState,
        config: &AutoplayConfig,
        now: u64,
        out: &mut Outbox,
    ) -> bool {
        if state
            .autoplay
            .last_requeue_time
            .is_some_and(|last| now.saturating_sub(last) < config.requeue_cooldown_ms)
        {
            tracing::debug!("Requeue suppressed by cooldown");
            return false;
        }
        state.autoplay.last_requeue_time = Some(now);

        state.reset_match();
        state.phase = MatchPhase::Idle;
        out.action(OutgoingAction::Leave);

        let game = queue_game(&state.autoplay.mode);
        let [warp_lobby, warp_bedwars, play] = config.step_delays_ms;
        let chain = state.autoplay.requeue.start(
            now,
            [
                (
                    warp_lobby,
                    OutgoingAction::Warp {
                        destination: "lobby".to_string(),
                    },
                ),
                (
                    warp_bedwars,
                    OutgoingAction::Warp {
                        destination: "bedwars".to_string(),
                    },
                ),
                (play, OutgoingAction::Play { game: game.clone() }),
            ],
        );
        tracing::info!(chain, game = %game, "Requeueing");
        true
    }
}

fn count_items_near(items: &[ItemEntity], pos: BlockPos, kind: ItemKind, tolerance: f64) -> u32 {
    let center = pos.center();
    items
        .iter()
        .filter(|item| item.kind == kind)
        .filter(|item| {
            let d = (item.position - center).abs();
            d.x <= tolerance && d.y <= tolerance && d.z <= tolerance
        })
        .map(|item| item.count)
        .sum()
}

fn item_on_top(items: &[ItemEntity], pos: BlockPos, kind: ItemKind, scan: &ScanConfig) -> bool {
    let center = pos.center();
    let top = f64::from(pos.y) + 1.0;
    items.iter().filter(|item| item.kind == kind).any(|item| {
        let above = item.position.y - top;
        (item.position.x - center.x).abs() <= scan.on_top_horizontal
            && (item.position.z - center.z).abs() <= scan.on_top_horizontal
            && (0.0..=scan.on_top_vertical).contains(&above)
    })
}

fn credit_pickup(
    state: &mut RuntimeState,
    enemies: &[&PlayerSnapshot],
    pos: BlockPos,
    kind: GeneratorKind,
    taken: u32,
    radius: f64,
) {
    let center: DVec3 = pos.center();
    let Some(collector) = enemies
        .iter()
        .map(|p| (p, p.position.distance(center)))
        .filter(|(_, d)| *d <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(p, _)| p)
    else {
        return;
    };

    let intel = state
        .tracked_enemies
        .entry(collector.name.to_ascii_lowercase())
        .or_default();
    match kind {
        GeneratorKind::Diamond => intel.diamonds += taken,
        GeneratorKind::Emerald => intel.emeralds += taken,
    }
    tracing::debug!(player = %collector.name, ?kind, taken, "Generator pickup");
}
