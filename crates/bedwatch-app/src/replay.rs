//! RON replay scripts and the driver that plays them through a session.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bedwatch_config::Config;
use bedwatch_core::session::SessionConfig;
use bedwatch_core::{
    HostEvent, MatchRuntime, MemoryHistoryStore, MemoryStatsProvider, PlayerHistoryStore,
    PlayerStats, RuntimeOutput, RuntimeSnapshot, SessionError, spawn_session,
};
use serde::{Deserialize, Serialize};

/// Virtual tick spacing in fast mode, matching the live 20 Hz tick.
const FAST_TICK_MS: u64 = 50;

/// Errors raised while loading or playing a script.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// The script could not be read.
    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),

    /// The script is not valid RON.
    #[error("failed to parse script: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Event timestamps go backwards.
    #[error("event {index} at {at_ms} ms is earlier than the event before it")]
    OutOfOrder {
        /// Position of the offending event.
        index: usize,
        /// Its timestamp.
        at_ms: u64,
    },

    /// The session stopped early.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// A player blacklisted before the replay starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistSeed {
    /// Player name.
    pub player: String,
    /// Reason shown on join.
    pub reason: String,
}

/// A scripted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    /// Stats the provider knows.
    #[serde(default)]
    pub stats: Vec<PlayerStats>,
    /// Manual blacklist entries present from the start.
    #[serde(default)]
    pub blacklist: Vec<BlacklistSeed>,
    /// `(at_ms, event)` pairs in time order.
    pub events: Vec<(u64, HostEvent)>,
}

impl ReplayScript {
    /// Parses a script from RON text.
    pub fn from_ron(text: &str) -> Result<Self, ReplayError> {
        let script: Self = ron::from_str(text)?;
        script.validate()?;
        Ok(script)
    }

    fn validate(&self) -> Result<(), ReplayError> {
        let mut last = 0;
        for (index, (at_ms, _)) in self.events.iter().enumerate() {
            if *at_ms < last {
                return Err(ReplayError::OutOfOrder {
                    index,
                    at_ms: *at_ms,
                });
            }
            last = *at_ms;
        }
        Ok(())
    }
}

/// Reads and parses a script file.
pub fn load_script(path: &Path) -> Result<ReplayScript, ReplayError> {
    let text = std::fs::read_to_string(path)?;
    ReplayScript::from_ron(&text)
}

/// What a finished replay produced.
#[derive(Debug)]
pub struct ReplaySummary {
    /// Script events delivered.
    pub events: usize,
    /// Outputs printed.
    pub outputs: usize,
    /// Final session snapshot.
    pub snapshot: RuntimeSnapshot,
}

/// Plays `script` through a new session, passing every output line to `emit`.
///
/// In fast mode ticks are generated at virtual 50 ms steps between events and
/// nothing sleeps. Otherwise events are delivered at their scripted offsets
/// and the session ticks on its own.
pub async fn run(
    script: ReplayScript,
    config: Config,
    fast: bool,
    mut emit: impl FnMut(&RuntimeOutput),
) -> Result<ReplaySummary, ReplayError> {
    let start_ms = script.events.first().map_or(0, |(at, _)| *at);

    let stats = Arc::new(MemoryStatsProvider::new());
    for entry in script.stats {
        stats.insert(entry);
    }
    let history = Arc::new(MemoryHistoryStore::new());
    for seed in &script.blacklist {
        history.add_manual(&seed.player, &seed.reason, start_ms);
    }

    let started = Instant::now();
    let session_config = if fast {
        SessionConfig {
            tick_interval: None,
            ..SessionConfig::default()
        }
    } else {
        SessionConfig {
            clock: Arc::new(move || start_ms + started.elapsed().as_millis() as u64),
            ..SessionConfig::default()
        }
    };

    let runtime = MatchRuntime::new(config, stats, history);
    let (handle, mut outputs, task) = spawn_session(runtime, session_config);

    let mut printed = 0;
    let mut print = |output: RuntimeOutput| {
        emit(&output);
        printed += 1;
    };

    let events = script.events.len();
    let mut virtual_now = start_ms;
    for (at_ms, event) in script.events {
        if fast {
            while virtual_now + FAST_TICK_MS <= at_ms {
                virtual_now += FAST_TICK_MS;
                handle.send_at(HostEvent::Tick, virtual_now).await?;
            }
        } else {
            let due = started + Duration::from_millis(at_ms - start_ms);
            let sleep = tokio::time::sleep_until(due.into());
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    Some(output) = outputs.recv() => print(output),
                }
            }
        }
        virtual_now = at_ms;
        tracing::debug!(at_ms, "Replaying event");
        handle.send_at(event, at_ms).await?;
        while let Ok(output) = outputs.try_recv() {
            print(output);
        }
    }

    handle.shutdown();
    let runtime = task
        .await
        .map_err(|_| ReplayError::Session(SessionError::Closed))?;
    while let Some(output) = outputs.recv().await {
        print(output);
    }

    Ok(ReplaySummary {
        events,
        outputs: printed,
        snapshot: runtime.snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use bedwatch_core::{AudioCue, MatchPhase, OutgoingAction};

    use super::*;

    const SAMPLE: &str = include_str!("../scripts/lobby_threat.ron");

    #[test]
    fn test_sample_script_parses() {
        let script = ReplayScript::from_ron(SAMPLE).unwrap();
        assert_eq!(script.stats.len(), 2);
        assert_eq!(script.blacklist.len(), 1);
        assert!(matches!(script.events[0].1, HostEvent::World(_)));
    }

    #[test]
    fn test_out_of_order_events_rejected() {
        let text = r#"(events: [(100, Tick), (50, Tick)])"#;
        assert!(matches!(
            ReplayScript::from_ron(text),
            Err(ReplayError::OutOfOrder { index: 1, at_ms: 50 })
        ));
    }

    #[tokio::test]
    async fn test_fast_replay_of_sample() {
        let script = ReplayScript::from_ron(SAMPLE).unwrap();
        let mut config = Config::default();
        config.autoplay.enabled = true;

        let mut printed = Vec::new();
        let summary = run(script, config, true, |o| printed.push(o.clone()))
            .await
            .unwrap();

        assert_eq!(summary.outputs, printed.len());
        assert!(printed.contains(&RuntimeOutput::Audio(AudioCue::Blacklisted)));
        assert!(printed.contains(&RuntimeOutput::Audio(AudioCue::ExtremeThreat)));
        assert!(printed.contains(&RuntimeOutput::Action(OutgoingAction::Leave)));
        assert_eq!(summary.snapshot.phase, MatchPhase::Idle);
    }
}
