//! Automatic blacklist policy.

use std::collections::BTreeSet;

use bedwatch_config::AutoBlacklistConfig;

use crate::history::{BlacklistSource, DAY_MS, HOUR_MS, Outcome, PlayerHistoryStore};

/// Lists players who keep beating us.
pub struct AutoBlacklistManager;

impl AutoBlacklistManager {
    /// Evaluates every player of a just-finished match.
    ///
    /// A player is (re-)listed when their LOSS count within the lookback
    /// window reaches the threshold, unless they carry a manual entry or an
    /// automatic entry added within the cooldown. Returns the names that were
    /// (re-)listed. A disabled policy or non-positive threshold/lookback
    /// never lists anyone.
    pub fn evaluate<'a>(
        encountered: impl IntoIterator<Item = &'a String>,
        store: &dyn PlayerHistoryStore,
        config: &AutoBlacklistConfig,
        now: u64,
    ) -> Vec<String> {
        if !config.auto_enabled || config.loss_threshold <= 0 || config.lookback_days <= 0 {
            return Vec::new();
        }

        let threshold = u32::try_from(config.loss_threshold).unwrap_or(u32::MAX);
        let lookback_days = config.lookback_days as u64;
        let cooldown_ms = (config.cooldown_hours.max(0) as u64).saturating_mul(HOUR_MS);
        let expires_at = match config.duration_days {
            days if days > 0 => now.saturating_add((days as u64).saturating_mul(DAY_MS)),
            _ => 0,
        };

        let players: BTreeSet<&String> = encountered.into_iter().collect();
        let mut listed = Vec::new();
        for player in players {
            let existing = store.blacklist_entry(player, now);
            if let Some(entry) = &existing {
                if entry.source == BlacklistSource::Manual {
                    continue;
                }
                if now.saturating_sub(entry.last_auto_add_at) < cooldown_ms {
                    continue;
                }
            }

            let losses = store.count_outcome_within(player, Outcome::Loss, lookback_days, now);
            if losses < threshold {
                continue;
            }

            let reason = format!("Lost {losses} times in {lookback_days} days");
            if store.add_auto(player, &reason, expires_at, now) {
                tracing::info!(player = %player, losses, expires_at, "Auto-blacklisted");
                listed.push(player.clone());
            }
        }
        listed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistoryStore;

    const NOW: u64 = 1_700_000_000_000;

    fn lose(store: &MemoryHistoryStore, player: &str, times: u32, at: u64) {
        for _ in 0..times {
            store.record_encounter(player, Outcome::Loss, at);
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_lists_player_at_threshold() {
        let store = MemoryHistoryStore::new();
        let config = AutoBlacklistConfig::default();
        lose(&store, "sweat", 3, NOW);
        lose(&store, "casual", 2, NOW);

        let listed =
            AutoBlacklistManager::evaluate(&names(&["sweat", "casual"]), &store, &config, NOW);
        assert_eq!(listed, vec!["sweat".to_string()]);

        let entry = store.blacklist_entry("sweat", NOW).unwrap();
        assert_eq!(entry.source, BlacklistSource::Auto);
        assert_eq!(entry.expires_at, NOW + 3 * DAY_MS);
    }

    #[test]
    fn test_manual_entry_is_never_touched() {
        let store = MemoryHistoryStore::new();
        let config = AutoBlacklistConfig::default();
        store.add_manual("cheater", "fly hacks", NOW - DAY_MS);

        for losses in [3, 10, 100] {
            lose(&store, "cheater", losses, NOW);
            let listed =
                AutoBlacklistManager::evaluate(&names(&["cheater"]), &store, &config, NOW);
            assert!(listed.is_empty());
            let entry = store.blacklist_entry("cheater", NOW).unwrap();
            assert_eq!(entry.source, BlacklistSource::Manual);
            assert_eq!(entry.reason, "fly hacks");
        }
    }

    #[test]
    fn test_auto_entry_retriggers_only_after_cooldown() {
        let store = MemoryHistoryStore::new();
        let config = AutoBlacklistConfig::default();
        let players = names(&["sweat"]);
        lose(&store, "sweat", 3, NOW);

        assert_eq!(
            AutoBlacklistManager::evaluate(&players, &store, &config, NOW).len(),
            1
        );

        let within = NOW + 12 * HOUR_MS - 1;
        assert!(AutoBlacklistManager::evaluate(&players, &store, &config, within).is_empty());
        assert_eq!(
            store.blacklist_entry("sweat", within).unwrap().last_auto_add_at,
            NOW
        );

        let after = NOW + 12 * HOUR_MS;
        assert_eq!(
            AutoBlacklistManager::evaluate(&players, &store, &config, after),
            players
        );
        assert_eq!(
            store.blacklist_entry("sweat", after).unwrap().last_auto_add_at,
            after
        );
    }

    #[test]
    fn test_old_losses_fall_out_of_lookback() {
        let store = MemoryHistoryStore::new();
        let config = AutoBlacklistConfig::default();
        lose(&store, "sweat", 2, NOW - 8 * DAY_MS);
        lose(&store, "sweat", 1, NOW);
        assert!(AutoBlacklistManager::evaluate(&names(&["sweat"]), &store, &config, NOW).is_empty());
    }

    #[test]
    fn test_misconfiguration_disables_policy() {
        let store = MemoryHistoryStore::new();
        lose(&store, "sweat", 10, NOW);
        let players = names(&["sweat"]);

        let disabled = AutoBlacklistConfig {
            auto_enabled: false,
            ..AutoBlacklistConfig::default()
        };
        let zero_threshold = AutoBlacklistConfig {
            loss_threshold: 0,
            ..AutoBlacklistConfig::default()
        };
        let negative_lookback = AutoBlacklistConfig {
            lookback_days: -1,
            ..AutoBlacklistConfig::default()
        };
        for config in [disabled, zero_threshold, negative_lookback] {
            assert!(AutoBlacklistManager::evaluate(&players, &store, &config, NOW).is_empty());
        }
        assert_eq!(store.blacklist_len(), 0);
    }

    #[test]
    fn test_zero_duration_never_expires() {
        let store = MemoryHistoryStore::new();
        let config = AutoBlacklistConfig {
            duration_days: 0,
            ..AutoBlacklistConfig::default()
        };
        lose(&store, "sweat", 3, NOW);
        AutoBlacklistManager::evaluate(&names(&["sweat"]), &store, &config, NOW);
        assert!(store.blacklist_entry("sweat", NOW + 1_000 * DAY_MS).is_some());
    }
}
