//! Pre-game lobby join tracking.
//!
//! Stat fetches are asynchronous and may complete on any thread. Their
//! callbacks only push a [`StatsCompletion`] onto a channel; the runtime
//! drains that channel on its own thread and applies each completion with
//! [`LobbyTrackerService::apply_completion`].

use crossbeam_channel::Sender;

use crate::history::PlayerHistoryStore;
use crate::output::{AudioCue, Outbox, Severity};
use crate::state::{JoinEntry, RuntimeState};
use crate::stats::{PlayerStats, StatsCallback, StatsError, StatsProvider, ThreatLevel};

/// A finished stat fetch waiting to be applied.
#[derive(Debug)]
pub struct StatsCompletion {
    /// Player the fetch was for.
    pub name: String,
    /// Match generation at the time the fetch was issued.
    pub generation: u64,
    /// Fetch result.
    pub result: Result<PlayerStats, StatsError>,
}

/// Everything a join needs besides the session record.
pub struct JoinContext<'a> {
    /// Stat lookups.
    pub stats: &'a dyn StatsProvider,
    /// Blacklist and encounter history.
    pub history: &'a dyn PlayerHistoryStore,
    /// Where fetch callbacks deliver their results.
    pub completions: &'a Sender<StatsCompletion>,
}

/// Tracks who joins the pre-game lobby.
pub struct LobbyTrackerService;

impl LobbyTrackerService {
    /// Registers a join. A player already in the list only gets a fresh
    /// timestamp.
    pub fn track_player_join(
        state: &mut RuntimeState,
        ctx: &JoinContext<'_>,
        name: &str,
        id: Option<&str>,
        now: u64,
        out: &mut Outbox,
    ) {
        if let Some(entry) = state.join_entry_mut(name) {
            entry.joined_at = now;
            return;
        }

        let mut entry = JoinEntry::new(name, now);
        state.encountered.insert(name.to_ascii_lowercase());

        if let Some(listed) = ctx.history.blacklist_entry(name, now) {
            entry.blacklisted = true;
            entry.blacklist_reason = Some(listed.reason.clone());
            out.notify(
                Severity::Danger,
                format!("Blacklisted player {name} joined: {}", listed.reason),
            );
            out.audio(AudioCue::Blacklisted);
        }

        entry.encounters = ctx.history.encounter_count(name);
        entry.win_loss = ctx.history.win_loss(name);

        let fetch = ctx.stats.has_key();
        entry.fetch_pending = fetch;
        state.recent_joins.push(entry);
        tracing::debug!(player = %name, fetch, "Lobby join");

        if fetch {
            let callback = completion_callback(ctx.completions.clone(), name, state.generation);
            match id {
                Some(id) => ctx.stats.fetch_by_identity(name, id, callback),
                None => ctx.stats.fetch_by_name(name, callback),
            }
        }
    }

    /// Applies a finished fetch to its join entry.
    ///
    /// Completions from an earlier match are dropped. A completion whose
    /// entry already aged out still raises its threat notification.
    pub fn apply_completion(state: &mut RuntimeState, completion: StatsCompletion, out: &mut Outbox) {
        let StatsCompletion {
            name,
            generation,
            result,
        } = completion;
        if generation != state.generation {
            tracing::debug!(player = %name, generation, "Discarding stale stats");
            return;
        }

        let entry = state.join_entry_mut(&name);
        if entry.is_none() {
            tracing::debug!(player = %name, "Stats arrived after join expired");
        }

        match result {
            Ok(stats) => {
                notify_threat(&name, &stats, out);
                if let Some(entry) = entry {
                    entry.fetch_pending = false;
                    entry.stats = Some(stats);
                    entry.stats_error = None;
                }
            }
            Err(err) => {
                tracing::warn!(player = %name, error = %err, "Stats fetch failed");
                if let Some(entry) = entry {
                    entry.fetch_pending = false;
                    entry.stats_error = Some(err.to_string());
                }
            }
        }
    }

    /// Drops joins older than the display TTL.
    pub fn trim_recent_joins(state: &mut RuntimeState, ttl_ms: u64, now: u64) {
        state.recent_joins.retain(|entry| !entry.is_expired(now, ttl_ms));
    }
}

/// MEDIUM and above are announced; EXTREME also gets its own sound.
fn notify_threat(name: &str, stats: &PlayerStats, out: &mut Outbox) {
    let threat = stats.threat_level();
    if threat < ThreatLevel::Medium {
        return;
    }
    let severity = match threat {
        ThreatLevel::Extreme => Severity::Danger,
        ThreatLevel::High => Severity::Warning,
        _ => Severity::Info,
    };
    out.notify(severity, format!("{name} {} is {threat} threat", stats.summary()));
    if threat == ThreatLevel::Extreme {
        out.audio(AudioCue::ExtremeThreat);
    }
}

fn completion_callback(
    tx: Sender<StatsCompletion>,
    name: &str,
    generation: u64,
) -> StatsCallback {
    let name = name.to_string();
    Box::new(move |result| {
        if tx
            .send(StatsCompletion {
                name,
                generation,
                result,
            })
            .is_err()
        {
            tracing::debug!("Stats completion dropped, runtime is gone");
        }
    })
}
