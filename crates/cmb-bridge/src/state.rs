//! Bridge lifecycle.
//!
//! `Starting → Connected → Running → Stopping → Stopped`. A bridge that
//! fails before reaching the broker goes straight from `Starting` to
//! `Stopped`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Layer resolution and relay setup.
    Starting,
    /// Broker session up, inbound relay live.
    Connected,
    /// Outbound loop running.
    Running,
    /// Outbound loop finished, disconnecting.
    Stopping,
    Stopped,
}

impl BridgeState {
    pub fn can_transition_to(self, next: Self) -> bool {
        use BridgeState::*;
        matches!(
            (self, next),
            (Starting, Connected)
                | (Starting, Stopped)
                | (Connected, Running)
                | (Connected, Stopping)
                | (Running, Stopping)
                | (Stopping, Stopped)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Connected => "connected",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the current state and rejects out-of-order transitions.
#[derive(Debug)]
pub struct Lifecycle {
    state: BridgeState,
    history: Vec<BridgeState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: BridgeState::Starting,
            history: vec![BridgeState::Starting],
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Every state entered so far, starting with `Starting`.
    pub fn history(&self) -> &[BridgeState] {
        &self.history
    }

    /// Move to `next`. Returns `false` and keeps the current state if the
    /// transition is not allowed.
    pub fn advance(&mut self, next: BridgeState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::warn!(from = %self.state, to = %next, "ignoring invalid bridge state transition");
            return false;
        }
        tracing::debug!(from = %self.state, to = %next, "bridge state changed");
        self.state = next;
        self.history.push(next);
        true
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
