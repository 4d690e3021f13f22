//! Operation lifecycle phases and the legal transitions between them.
//!
//! The runner drives each dispatched operation through this machine. A
//! transition into a terminal phase wins: anything arriving afterwards
//! (e.g. a late readiness racing a destruction) is a stale notification
//! and is dropped.

use tracing::debug;

/// Lifecycle phase of a dispatched operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Queued, not yet handed to a runner.
    Created,
    /// `prepare` has been invoked and its verdict is pending.
    Preparing,
    /// Preparation succeeded; `run` may proceed.
    Ready,
    /// `run` is executing.
    Running,
    /// `run` finished.
    Completed,
    /// Preparation reported `false`.
    Failed,
    /// Preparation outlived the configured timeout.
    TimedOut,
    /// The owner destroyed the operation.
    Destroyed,
}

impl Phase {
    /// No transition leaves a terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Phase::Completed | Phase::Failed | Phase::TimedOut | Phase::Destroyed
        )
    }

    /// Whether moving from `self` to `to` is a legal transition.
    pub fn can_advance(self, to: Phase) -> bool {
        use Phase::{Completed, Created, Destroyed, Failed, Preparing, Ready, Running, TimedOut};
        match (self, to) {
            (Created, Preparing) => true,
            (Preparing, Ready | Failed | TimedOut | Destroyed) => true,
            // Destruction can still land between readiness and run.
            (Ready, Running | Destroyed) => true,
            (Running, Completed) => true,
            _ => false,
        }
    }
}

/// Tracks the phase of one dispatched operation, dropping stale
/// transitions instead of applying them.
#[derive(Debug)]
pub struct PhaseTracker {
    name: String,
    phase: Phase,
}

impl PhaseTracker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: Phase::Created,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Advance to `to` if legal. Returns whether the transition applied;
    /// stale or illegal transitions are logged and ignored.
    pub fn advance(&mut self, to: Phase) -> bool {
        if self.phase.can_advance(to) {
            self.phase = to;
            true
        } else {
            debug!(
                op = %self.name,
                from = ?self.phase,
                to = ?to,
                "ignoring stale lifecycle transition"
            );
            false
        }
    }
}
