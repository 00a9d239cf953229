//! Tokio actor around a [`MatchRuntime`].
//!
//! The actor task owns the runtime outright. Host events and config reloads
//! arrive on an mpsc channel, ticks come from an interval, outputs leave on
//! an unbounded channel and the latest [`RuntimeSnapshot`] is published on a
//! watch channel for polling.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bedwatch_config::Config;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

use crate::event::HostEvent;
use crate::output::RuntimeOutput;
use crate::runtime::{MatchRuntime, RuntimeSnapshot};

/// Source of the current time in Unix milliseconds.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Wall-clock Unix milliseconds.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Error returned when talking to a stopped session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The actor task has exited.
    #[error("session closed")]
    Closed,
}

/// Settings for [`spawn_session`].
#[derive(Clone)]
pub struct SessionConfig {
    /// Tick period. `None` disables automatic ticks; the host sends
    /// [`HostEvent::Tick`] itself. Default: 50 ms.
    pub tick_interval: Option<Duration>,
    /// Capacity of the inbound event queue. Default: 256.
    pub event_capacity: usize,
    /// Time source for events sent without a timestamp and for ticks.
    pub clock: Clock,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Some(Duration::from_millis(50)),
            event_capacity: 256,
            clock: Arc::new(unix_millis),
        }
    }
}

enum SessionMessage {
    Event { event: HostEvent, at: Option<u64> },
    Reload(Box<Config>),
}

/// Handle for feeding a running session.
pub struct SessionHandle {
    tx: mpsc::Sender<SessionMessage>,
    snapshot_rx: watch::Receiver<RuntimeSnapshot>,
    shutdown_tx: watch::Sender<bool>,
}

impl SessionHandle {
    /// Delivers an event stamped with the session clock.
    pub async fn send(&self, event: HostEvent) -> Result<(), SessionError> {
        self.push(SessionMessage::Event { event, at: None }).await
    }

    /// Delivers an event stamped with `at_ms`.
    pub async fn send_at(&self, event: HostEvent, at_ms: u64) -> Result<(), SessionError> {
        self.push(SessionMessage::Event {
            event,
            at: Some(at_ms),
        })
        .await
    }

    /// Replaces the runtime's configuration.
    pub async fn reload_config(&self, config: Config) -> Result<(), SessionError> {
        self.push(SessionMessage::Reload(Box::new(config))).await
    }

    async fn push(&self, message: SessionMessage) -> Result<(), SessionError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> RuntimeSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// A receiver notified on every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<RuntimeSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Signals the actor to stop once the queued messages are handled.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Starts the actor. The join handle yields the runtime back once the
/// session stops.
pub fn spawn_session(
    runtime: MatchRuntime,
    config: SessionConfig,
) -> (
    SessionHandle,
    mpsc::UnboundedReceiver<RuntimeOutput>,
    JoinHandle<MatchRuntime>,
) {
    let (tx, rx) = mpsc::channel(config.event_capacity.max(1));
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(runtime.snapshot());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(run_session(
        runtime,
        config,
        rx,
        out_tx,
        snapshot_tx,
        shutdown_rx,
    ));

    (
        SessionHandle {
            tx,
            snapshot_rx,
            shutdown_tx,
        },
        out_rx,
        task,
    )
}

async fn run_session(
    mut runtime: MatchRuntime,
    config: SessionConfig,
    mut rx: mpsc::Receiver<SessionMessage>,
    out_tx: mpsc::UnboundedSender<RuntimeOutput>,
    snapshot_tx: watch::Sender<RuntimeSnapshot>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> MatchRuntime {
    let mut ticker = config.tick_interval.map(|period| {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });
    tracing::info!(tick = ?config.tick_interval, "Session started");

    loop {
        // Queued messages go first so a shutdown never drops them.
        let outputs = tokio::select! {
            biased;

            message = rx.recv() => match message {
                Some(SessionMessage::Event { event, at }) => {
                    let now = at.unwrap_or_else(|| (config.clock)());
                    runtime.handle(event, now)
                }
                Some(SessionMessage::Reload(new_config)) => {
                    tracing::info!("Session config reloaded");
                    runtime.set_config(*new_config);
                    Vec::new()
                }
                None => break,
            },
            _ = next_tick(&mut ticker) => runtime.handle(HostEvent::Tick, (config.clock)()),
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                Vec::new()
            }
        };

        // Publish state before the outputs that describe it.
        snapshot_tx.send_replace(runtime.snapshot());
        for output in outputs {
            let _ = out_tx.send(output);
        }
    }

    tracing::info!("Session stopped");
    runtime
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::history::MemoryHistoryStore;
    use crate::output::{AudioCue, OutgoingAction};
    use crate::state::MatchPhase;
    use crate::stats::{MemoryStatsProvider, PlayerStats};

    fn runtime(config: Config) -> MatchRuntime {
        let stats = Arc::new(MemoryStatsProvider::new());
        stats.insert(PlayerStats::new("Sweat", 900, 50, 2));
        MatchRuntime::new(config, stats, Arc::new(MemoryHistoryStore::new()))
    }

    fn manual() -> SessionConfig {
        SessionConfig {
            tick_interval: None,
            ..SessionConfig::default()
        }
    }

    fn chat(line: &str) -> HostEvent {
        HostEvent::Chat(line.to_string())
    }

    #[tokio::test]
    async fn test_events_produce_outputs_and_snapshot() {
        let (handle, mut outputs, task) = spawn_session(runtime(Config::default()), manual());

        handle.send_at(chat("Sending you to mini1A"), 0).await.unwrap();
        handle.send_at(chat("Sweat has joined (2/8)!"), 10).await.unwrap();

        let first = outputs.recv().await.unwrap();
        assert!(first.to_string().contains("Sweat"));
        assert_eq!(
            outputs.recv().await.unwrap(),
            RuntimeOutput::Audio(AudioCue::ExtremeThreat)
        );
        assert_eq!(handle.snapshot().phase, MatchPhase::LobbyTracking);

        handle.shutdown();
        let runtime = task.await.unwrap();
        assert_eq!(runtime.state().recent_joins.len(), 1);
    }

    #[tokio::test]
    async fn test_interval_ticks_drive_requeue() {
        let now = Arc::new(AtomicU64::new(0));
        let clock_now = Arc::clone(&now);
        let session = SessionConfig {
            tick_interval: Some(Duration::from_millis(5)),
            event_capacity: 16,
            clock: Arc::new(move || clock_now.load(Ordering::SeqCst)),
        };
        let mut config = Config::default();
        config.autoplay.enabled = true;
        let (handle, mut outputs, task) = spawn_session(runtime(config), session);

        handle.send(chat("Sending you to mini1A")).await.unwrap();
        handle.send(chat("Sweat has joined (2/8)!")).await.unwrap();

        async fn wait_for(
            outputs: &mut mpsc::UnboundedReceiver<RuntimeOutput>,
            wanted: RuntimeOutput,
        ) -> bool {
            while let Some(output) = outputs.recv().await {
                if output == wanted {
                    return true;
                }
            }
            false
        }

        // The join has been handled once its threat cue is out.
        let joined = tokio::time::timeout(
            Duration::from_secs(5),
            wait_for(&mut outputs, RuntimeOutput::Audio(AudioCue::ExtremeThreat)),
        )
        .await
        .unwrap();
        assert!(joined);

        now.store(3_000, Ordering::SeqCst);
        let left = tokio::time::timeout(
            Duration::from_secs(5),
            wait_for(&mut outputs, RuntimeOutput::Action(OutgoingAction::Leave)),
        )
        .await
        .unwrap();
        assert!(left);

        handle.shutdown();
        let runtime = task.await.unwrap();
        assert_eq!(runtime.state().autoplay.last_requeue_time, Some(3_000));
    }

    #[tokio::test]
    async fn test_config_reload_reaches_runtime() {
        let (handle, _outputs, task) = spawn_session(runtime(Config::default()), manual());
        let mut config = Config::default();
        config.tracker.join_display_ttl_ms = 1_234;
        handle.reload_config(config).await.unwrap();

        handle.shutdown();
        let runtime = task.await.unwrap();
        assert_eq!(runtime.config().tracker.join_display_ttl_ms, 1_234);
    }

    #[tokio::test]
    async fn test_send_after_shutdown_fails() {
        let (handle, _outputs, task) = spawn_session(runtime(Config::default()), manual());
        handle.shutdown();
        task.await.unwrap();
        assert_eq!(
            handle.send(HostEvent::Tick).await,
            Err(SessionError::Closed)
        );
    }
}
