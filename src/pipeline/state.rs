//! Session state management

use std::time::Instant;

/// Session state machine
///
/// `Idle → Initializing → Running → Stopped`. Initialization may abort straight to
/// `Stopped`; a stopped session cannot be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session created, nothing allocated yet
    Idle,

    /// Decoder allocated, waiting for the first packet
    Initializing,

    /// Processing packets
    Running {
        /// When the session started running
        started_at: Instant,
    },

    /// Session ended; decoder and conversion resources are released
    Stopped,
}

impl SessionState {
    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        use SessionState::*;

        match (self, target) {
            (Idle, Initializing) => true,

            (Initializing, Running { .. }) => true,
            (Initializing, Stopped) => true,

            (Running { .. }, Stopped) => true,

            // From Stopped - no transitions allowed
            (Stopped, Stopped) => true,
            (Stopped, _) => false,

            (Running { .. }, Running { .. }) => true,
            (a, b) if a == b => true,

            _ => false,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Initializing => "Initializing",
            SessionState::Running { .. } => "Running",
            SessionState::Stopped => "Stopped",
        }
    }

    /// Whether the loop should pull another packet.
    pub fn accepts_packets(&self) -> bool {
        matches!(
            self,
            SessionState::Initializing | SessionState::Running { .. }
        )
    }

    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Running { .. })
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, SessionState::Stopped)
    }

    /// Get the duration since the session started running
    pub fn running_duration(&self) -> Option<std::time::Duration> {
        if let SessionState::Running { started_at } = self {
            Some(started_at.elapsed())
        } else {
            None
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
