//! Per-team threat aggregation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stats::{StatsProvider, ThreatLevel};
use crate::world::PlayerSnapshot;

/// Aggregated threat of one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamDangerEntry {
    /// Team registry key.
    pub team_key: String,
    /// Team display name.
    pub display_name: String,
    /// The local player's team.
    pub own_team: bool,
    /// Players seen on the team.
    pub total_players: u32,
    /// Players with a cached threat tier.
    pub known_players: u32,
    /// Sum of ordinal threat scores of known players.
    pub threat_score: u32,
}

impl TeamDangerEntry {
    /// Average threat score of known players (0 when nobody is known).
    pub fn average_score(&self) -> f64 {
        if self.known_players == 0 {
            0.0
        } else {
            f64::from(self.threat_score) / f64::from(self.known_players)
        }
    }

    /// Average re-bucketed into a tier.
    pub fn average_label(&self) -> ThreatLevel {
        average_threat_label(self.average_score())
    }
}

/// Buckets a team average back into a tier.
///
/// Thresholds 1.5 / 2.5 / 3.5 are coarser than the individual-player cutoffs
/// in [`crate::stats::PlayerStats::threat_level`]; the two are kept separate.
pub fn average_threat_label(average: f64) -> ThreatLevel {
    if average >= 3.5 {
        ThreatLevel::Extreme
    } else if average >= 2.5 {
        ThreatLevel::High
    } else if average >= 1.5 {
        ThreatLevel::Medium
    } else {
        ThreatLevel::Low
    }
}

/// Builds team danger summaries from visible players and cached stats.
pub struct TeamDangerAnalyzer;

impl TeamDangerAnalyzer {
    /// Groups `players` by team registry key and sums cached threat scores.
    ///
    /// Team keys compare case-insensitively; the first spelling seen is kept.
    /// Players without a team key are skipped. Returns nothing until at
    /// least two distinct teams are visible. Sorted by average score
    /// (highest first), ties by display name.
    pub fn build_summary<'a>(
        players: impl IntoIterator<Item = &'a PlayerSnapshot>,
        own_team_key: Option<&str>,
        stats: &dyn StatsProvider,
    ) -> Vec<TeamDangerEntry> {
        let mut teams: BTreeMap<String, TeamDangerEntry> = BTreeMap::new();

        for player in players {
            let Some(key) = player.team_key.as_deref() else {
                continue;
            };
            let entry = teams
                .entry(key.to_ascii_lowercase())
                .or_insert_with(|| TeamDangerEntry {
                    team_key: key.to_string(),
                    display_name: player
                        .team_display
                        .clone()
                        .unwrap_or_else(|| key.to_string()),
                    own_team: own_team_key.is_some_and(|own| own.eq_ignore_ascii_case(key)),
                    total_players: 0,
                    known_players: 0,
                    threat_score: 0,
                });
            entry.total_players += 1;
            if let Some(threat) = stats.cached_threat(&player.name) {
                entry.known_players += 1;
                entry.threat_score += threat.score();
            }
        }

        if teams.len() < 2 {
            return Vec::new();
        }

        let mut summary: Vec<_> = teams.into_values().collect();
        summary.sort_by(|a, b| {
            b.average_score()
                .total_cmp(&a.average_score())
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        summary
    }

    /// Highest average among enemy teams, 0 when none is known.
    pub fn highest_enemy_average(summary: &[TeamDangerEntry]) -> f64 {
        summary
            .iter()
            .filter(|team| !team.own_team)
            .map(TeamDangerEntry::average_score)
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec3;

    use super::*;
    use crate::stats::{MemoryStatsProvider, PlayerStats};

    fn player(name: &str, key: &str, display: &str) -> PlayerSnapshot {
        PlayerSnapshot::new(name, DVec3::ZERO).with_team(key, display)
    }

    fn provider() -> MemoryStatsProvider {
        let stats = MemoryStatsProvider::new();
        stats.insert(PlayerStats::new("red1", 600, 0, 1)); // EXTREME
        stats.insert(PlayerStats::new("red2", 320, 0, 1)); // HIGH
        stats.insert(PlayerStats::new("blue1", 10, 0, 1)); // LOW
        stats.insert(PlayerStats::new("green1", 10, 0, 1)); // LOW
        stats
    }

    #[test]
    fn test_single_team_yields_nothing() {
        let players = [player("red1", "RED", "Red"), player("red2", "RED", "Red")];
        let summary = TeamDangerAnalyzer::build_summary(&players, None, &provider());
        assert!(summary.is_empty());
    }

    #[test]
    fn test_summary_groups_and_sorts() {
        let players = [
            player("red1", "RED", "Red"),
            player("red2", "RED", "Red"),
            player("red3", "RED", "Red"),
            player("blue1", "BLUE", "Blue"),
            player("green1", "GREEN", "Green"),
            PlayerSnapshot::new("spectator", DVec3::ZERO),
        ];
        let summary = TeamDangerAnalyzer::build_summary(&players, Some("blue"), &provider());

        assert_eq!(summary.len(), 3);
        let red = &summary[0];
        assert_eq!(red.display_name, "Red");
        assert_eq!(red.total_players, 3);
        assert_eq!(red.known_players, 2);
        assert_eq!(red.threat_score, 7);
        assert!((red.average_score() - 3.5).abs() < 1e-9);
        assert_eq!(red.average_label(), ThreatLevel::Extreme);

        // Blue and Green tie at 1.0; alphabetical order breaks the tie.
        assert_eq!(summary[1].display_name, "Blue");
        assert!(summary[1].own_team);
        assert_eq!(summary[2].display_name, "Green");
    }

    #[test]
    fn test_team_keys_ignore_case() {
        let players = [
            player("red1", "RED", "Red"),
            player("red2", "red", "Red"),
            player("blue1", "Blue", "Blue"),
        ];
        let summary = TeamDangerAnalyzer::build_summary(&players, Some("BLUE"), &provider());

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].team_key, "RED");
        assert_eq!(summary[0].total_players, 2);
        assert!(summary[1].own_team);
    }

    #[test]
    fn test_highest_enemy_average_skips_own_team() {
        let players = [
            player("red1", "RED", "Red"),
            player("blue1", "BLUE", "Blue"),
        ];
        let summary = TeamDangerAnalyzer::build_summary(&players, Some("RED"), &provider());
        assert!((TeamDangerAnalyzer::highest_enemy_average(&summary) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_threat_label_boundaries() {
        assert_eq!(average_threat_label(3.5), ThreatLevel::Extreme);
        assert_eq!(average_threat_label(3.49), ThreatLevel::High);
        assert_eq!(average_threat_label(2.5), ThreatLevel::High);
        assert_eq!(average_threat_label(2.49), ThreatLevel::Medium);
        assert_eq!(average_threat_label(1.5), ThreatLevel::Medium);
        assert_eq!(average_threat_label(1.49), ThreatLevel::Low);
        assert_eq!(average_threat_label(0.0), ThreatLevel::Low);
    }
}
