//! Teammate inference.
//!
//! No single signal identifies teammates in every game configuration, so
//! [`classify`] walks a fixed list of strategies from most to least
//! authoritative and reports the first that matches. Spawn-proximity matches
//! are remembered for the rest of the match.

use std::collections::HashSet;

use bedwatch_config::TeammateConfig;
use serde::{Deserialize, Serialize};

use crate::world::PlayerSnapshot;

/// How sure a strategy is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    /// Weak hint.
    Low,
    /// Usually right.
    Medium,
    /// Rarely wrong.
    High,
    /// Cannot be wrong.
    Certain,
}

/// The strategy that identified a teammate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeammateSignal {
    /// It is the local player.
    Identity,
    /// Inferred by spawn proximity earlier this match.
    InferredEarlier,
    /// Spawned next to us just now.
    SpawnProximity,
    /// Same name tag color.
    NameColor,
    /// Same native scoreboard team.
    NativeTeam,
    /// Same team registry key.
    TeamRegistry,
}

impl TeammateSignal {
    /// Strategies in evaluation order.
    pub const ORDER: [Self; 6] = [
        Self::Identity,
        Self::InferredEarlier,
        Self::SpawnProximity,
        Self::NameColor,
        Self::NativeTeam,
        Self::TeamRegistry,
    ];

    /// Confidence of a match by this strategy.
    pub fn confidence(self) -> Confidence {
        match self {
            Self::Identity => Confidence::Certain,
            Self::NativeTeam | Self::TeamRegistry => Confidence::High,
            Self::InferredEarlier | Self::SpawnProximity => Confidence::Medium,
            Self::NameColor => Confidence::Low,
        }
    }
}

/// Inputs shared by all strategies.
pub struct TeammateCheck<'a> {
    /// The local player.
    pub local: &'a PlayerSnapshot,
    /// Players already inferred this match.
    pub inferred: &'a HashSet<String>,
    /// Start of the spawn-proximity window, if one is open.
    pub window_start: Option<u64>,
    /// Current time.
    pub now: u64,
    /// Inference settings.
    pub config: &'a TeammateConfig,
}

/// Key under which an inferred teammate is remembered.
pub fn inference_key(player: &PlayerSnapshot) -> String {
    player
        .id
        .clone()
        .unwrap_or_else(|| player.name.to_ascii_lowercase())
}

/// Gray and white are what every unteamed player wears.
const NEUTRAL_COLORS: [char; 2] = ['7', 'f'];

impl TeammateCheck<'_> {
    /// Whether `strategy` matches `other`.
    pub fn matches(&self, strategy: TeammateSignal, other: &PlayerSnapshot) -> bool {
        let local = self.local;
        match strategy {
            TeammateSignal::Identity => match (&local.id, &other.id) {
                (Some(a), Some(b)) => a == b,
                _ => local.is_named(&other.name),
            },
            TeammateSignal::InferredEarlier => self.inferred.contains(&inference_key(other)),
            TeammateSignal::SpawnProximity => {
                let Some(start) = self.window_start else {
                    return false;
                };
                self.now.saturating_sub(start) <= self.config.spawn_window_ms
                    && local.position.distance(other.position) <= self.config.spawn_radius
            }
            TeammateSignal::NameColor => match (local.name_color, other.name_color) {
                (Some(a), Some(b)) => a == b && !NEUTRAL_COLORS.contains(&a),
                _ => false,
            },
            TeammateSignal::NativeTeam => match (&local.scoreboard_team, &other.scoreboard_team) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            TeammateSignal::TeamRegistry => match (&local.team_key, &other.team_key) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => false,
            },
        }
    }

    /// First strategy in [`TeammateSignal::ORDER`] that matches `other`.
    pub fn first_match(&self, other: &PlayerSnapshot) -> Option<TeammateSignal> {
        TeammateSignal::ORDER
            .into_iter()
            .find(|strategy| self.matches(*strategy, other))
    }
}

/// Classifies `other` relative to `local` and caches spawn-proximity matches
/// in `inferred`. `None` means not a teammate.
pub fn classify(
    local: &PlayerSnapshot,
    other: &PlayerSnapshot,
    inferred: &mut HashSet<String>,
    window_start: Option<u64>,
    now: u64,
    config: &TeammateConfig,
) -> Option<TeammateSignal> {
    let signal = TeammateCheck {
        local,
        inferred,
        window_start,
        now,
        config,
    }
    .first_match(other)?;

    if signal == TeammateSignal::SpawnProximity && inferred.insert(inference_key(other)) {
        tracing::debug!(player = %other.name, "Teammate inferred by spawn proximity");
    }
    Some(signal)
}

#[cfg(test)]
mod tests {
    use glam::DVec3;

    use super::*;

    fn me() -> PlayerSnapshot {
        PlayerSnapshot::new("Me", DVec3::ZERO).with_id("me-id")
    }

    #[test]
    fn test_identity_wins_over_everything() {
        let config = TeammateConfig::default();
        let mut inferred = HashSet::new();
        let copy = PlayerSnapshot::new("ME", DVec3::new(500.0, 0.0, 0.0));
        assert_eq!(
            classify(&me(), &copy, &mut inferred, None, 0, &config),
            Some(TeammateSignal::Identity)
        );
        assert_eq!(TeammateSignal::Identity.confidence(), Confidence::Certain);
    }

    #[test]
    fn test_spawn_proximity_is_cached_for_the_match() {
        let config = TeammateConfig::default();
        let mut inferred = HashSet::new();
        let mate = PlayerSnapshot::new("Mate", DVec3::new(3.0, 0.0, 4.0));

        assert_eq!(
            classify(&me(), &mate, &mut inferred, Some(1_000), 2_000, &config),
            Some(TeammateSignal::SpawnProximity)
        );

        // Window closed and the player walked away: still remembered.
        let moved = PlayerSnapshot::new("Mate", DVec3::new(80.0, 0.0, 0.0));
        assert_eq!(
            classify(&me(), &moved, &mut inferred, Some(1_000), 60_000, &config),
            Some(TeammateSignal::InferredEarlier)
        );
    }

    #[test]
    fn test_spawn_proximity_window_and_radius() {
        let config = TeammateConfig::default();
        let mut inferred = HashSet::new();
        let near = PlayerSnapshot::new("Near", DVec3::new(5.0, 0.0, 0.0));
        let far = PlayerSnapshot::new("Far", DVec3::new(10.5, 0.0, 0.0));

        assert_eq!(classify(&me(), &near, &mut inferred, Some(0), 2_001, &config), None);
        assert_eq!(classify(&me(), &far, &mut inferred, Some(0), 100, &config), None);
        assert_eq!(classify(&me(), &near, &mut inferred, None, 100, &config), None);
        assert!(inferred.is_empty());
    }

    #[test]
    fn test_color_team_and_registry_fallbacks() {
        let config = TeammateConfig::default();
        let mut inferred = HashSet::new();
        let far = DVec3::new(100.0, 0.0, 0.0);

        let mut local = me();
        local.name_color = Some('c');
        local.scoreboard_team = Some("team_1".to_string());
        local.team_key = Some("RED".to_string());

        let mut colored = PlayerSnapshot::new("A", far);
        colored.name_color = Some('c');
        assert_eq!(
            classify(&local, &colored, &mut inferred, None, 0, &config),
            Some(TeammateSignal::NameColor)
        );

        let mut native = PlayerSnapshot::new("B", far);
        native.scoreboard_team = Some("team_1".to_string());
        assert_eq!(
            classify(&local, &native, &mut inferred, None, 0, &config),
            Some(TeammateSignal::NativeTeam)
        );

        let registry = PlayerSnapshot::new("C", far).with_team("red", "Red");
        assert_eq!(
            classify(&local, &registry, &mut inferred, None, 0, &config),
            Some(TeammateSignal::TeamRegistry)
        );

        let enemy = PlayerSnapshot::new("D", far).with_team("BLUE", "Blue");
        assert_eq!(classify(&local, &enemy, &mut inferred, None, 0, &config), None);
    }

    #[test]
    fn test_neutral_name_color_is_ignored() {
        let config = TeammateConfig::default();
        let mut inferred = HashSet::new();
        let mut local = me();
        local.name_color = Some('7');
        let mut other = PlayerSnapshot::new("Lobby", DVec3::new(50.0, 0.0, 0.0));
        other.name_color = Some('7');
        assert_eq!(classify(&local, &other, &mut inferred, None, 0, &config), None);
    }
}
