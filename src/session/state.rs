//! Published session state.

use std::fmt;

/// Lifecycle phase of a control session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Idle,
    Bootstrapping,
    Connecting,
    Active,
    Disconnecting,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Bootstrapping => "bootstrapping",
            SessionPhase::Connecting => "connecting",
            SessionPhase::Active => "active",
            SessionPhase::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// What the UI shows: one human-readable line plus a few flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub message: String,
    pub camera_available: bool,
    /// Label of the attached gamepad, `None` while touch input is in charge
    pub gamepad_label: Option<String>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            message: "Not connected".to_string(),
            camera_available: true,
            gamepad_label: None,
        }
    }
}

/// Why a session run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Ended through the handle or by shutdown
    Ended,
    /// The control socket stopped working mid-session
    LinkLost,
    /// SSH login to the robot failed
    SshFailed,
    /// The start script did not report the control server active
    ControlServerDown,
    /// The control server was reported active but refused the connection
    ControlConnectFailed,
}

impl SessionOutcome {
    #[must_use]
    pub fn is_failure(self) -> bool {
        !matches!(self, SessionOutcome::Ended)
    }

    /// Final status line for this outcome
    pub fn message(self) -> &'static str {
        match self {
            SessionOutcome::Ended => "Disconnected",
            SessionOutcome::LinkLost => "Control link lost",
            SessionOutcome::SshFailed => "SSH connection failed",
            SessionOutcome::ControlServerDown => "Control server did not start",
            SessionOutcome::ControlConnectFailed => "Could not connect to control server",
        }
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
