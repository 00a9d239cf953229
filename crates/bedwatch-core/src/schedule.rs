//! Cancellable chain of delayed actions.
//!
//! The requeue flow sends several commands with fixed delays between them.
//! Instead of sleeping on a worker, the steps sit in an [`ActionSchedule`]
//! owned by the session state and are released by the tick that reaches their
//! due time. The gate passed to [`ActionSchedule::poll`] is consulted before
//! every step; a closed gate cancels whatever is left of the chain.

use std::collections::VecDeque;

use crate::output::OutgoingAction;

/// One delayed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledStep {
    /// Absolute due time in milliseconds.
    pub due_at: u64,
    /// Action to release.
    pub action: OutgoingAction,
}

/// At most one running chain of delayed actions.
#[derive(Debug, Default)]
pub struct ActionSchedule {
    steps: VecDeque<ScheduledStep>,
    chain_id: u64,
}

impl ActionSchedule {
    /// Creates an idle schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any running chain with `steps`, each given as a delay from `now`.
    /// Returns the id of the new chain.
    pub fn start(
        &mut self,
        now: u64,
        steps: impl IntoIterator<Item = (u64, OutgoingAction)>,
    ) -> u64 {
        self.chain_id += 1;
        self.steps = steps
            .into_iter()
            .map(|(delay, action)| ScheduledStep {
                due_at: now + delay,
                action,
            })
            .collect();
        self.steps.make_contiguous().sort_by_key(|s| s.due_at);
        self.chain_id
    }

    /// Drops every pending step. Returns how many were dropped.
    pub fn cancel(&mut self) -> usize {
        let dropped = self.steps.len();
        self.steps.clear();
        dropped
    }

    /// Whether a chain still has pending steps.
    pub fn is_active(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Number of pending steps.
    pub fn pending(&self) -> usize {
        self.steps.len()
    }

    /// Releases every step due at `now`, checking `gate` before each one.
    ///
    /// When the gate is closed the remaining chain is cancelled and nothing
    /// further is released.
    pub fn poll(&mut self, now: u64, mut gate: impl FnMut() -> bool) -> Vec<OutgoingAction> {
        let mut released = Vec::new();
        while self.steps.front().is_some_and(|s| s.due_at <= now) {
            if !gate() {
                let dropped = self.cancel();
                tracing::debug!(chain = self.chain_id, dropped, "Action chain cancelled");
                break;
            }
            if let Some(step) = self.steps.pop_front() {
                released.push(step.action);
            }
        }
        released
    }
}
