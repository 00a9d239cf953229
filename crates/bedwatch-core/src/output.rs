//! Side effects surfaced to the host: notifications, audio cues and outgoing
//! chat commands.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// Severity prefix of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Informational.
    Info,
    /// Something worth a look.
    Warning,
    /// Act now.
    Danger,
}

impl Severity {
    /// Bracketed label used as the message prefix.
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "[Info]",
            Self::Warning => "[Warning]",
            Self::Danger => "[Danger]",
        }
    }
}

/// Human-readable message for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Severity prefix.
    pub severity: Severity,
    /// Message body.
    pub text: String,
}

impl Notification {
    /// Creates a notification.
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.severity.label(), self.text)
    }
}

// ---------------------------------------------------------------------------
// AudioCue
// ---------------------------------------------------------------------------

/// Named sound triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioCue {
    /// An EXTREME-tier player joined.
    ExtremeThreat,
    /// A blacklisted player joined.
    Blacklisted,
    /// An enemy is close to our bed.
    BedProximity,
    /// An early rush is predicted.
    RushWarning,
    /// An invisible player is nearby.
    InvisiblePlayer,
}

// ---------------------------------------------------------------------------
// OutgoingAction
// ---------------------------------------------------------------------------

/// Chat command sent back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutgoingAction {
    /// Leave the current match.
    Leave,
    /// Warp to a named lobby.
    Warp {
        /// Lobby name.
        destination: String,
    },
    /// Join a queue.
    Play {
        /// Server-side game id.
        game: String,
    },
}

impl fmt::Display for OutgoingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leave => f.write_str("/leave"),
            Self::Warp { destination } => write!(f, "/warp {destination}"),
            Self::Play { game } => write!(f, "/play {game}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// One side effect produced while handling an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeOutput {
    /// Show a message.
    Notify(Notification),
    /// Play a sound.
    Audio(AudioCue),
    /// Send a chat command.
    Action(OutgoingAction),
}

impl fmt::Display for RuntimeOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notify(n) => n.fmt(f),
            Self::Audio(cue) => write!(f, "<sound {cue:?}>"),
            Self::Action(action) => write!(f, "> {action}"),
        }
    }
}

/// Collects outputs in emission order.
#[derive(Debug, Default)]
pub struct Outbox {
    outputs: Vec<RuntimeOutput>,
}

impl Outbox {
    /// Creates an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a notification.
    pub fn notify(&mut self, severity: Severity, text: impl Into<String>) {
        self.outputs
            .push(RuntimeOutput::Notify(Notification::new(severity, text)));
    }

    /// Queues an audio cue.
    pub fn audio(&mut self, cue: AudioCue) {
        self.outputs.push(RuntimeOutput::Audio(cue));
    }

    /// Queues an outgoing action.
    pub fn action(&mut self, action: OutgoingAction) {
        self.outputs.push(RuntimeOutput::Action(action));
    }

    /// Takes everything queued so far.
    pub fn drain(&mut self) -> Vec<RuntimeOutput> {
        std::mem::take(&mut self.outputs)
    }

    /// Outputs queued so far.
    pub fn outputs(&self) -> &[RuntimeOutput] {
        &self.outputs
    }
}
