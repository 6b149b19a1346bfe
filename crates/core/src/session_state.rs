use crate::error::SessionError;
use crate::events::AgentMode;
use crate::motion::{MotionAvailability, MotionDiagnostics};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionPhase {
    #[default]
    Idle,
    Connecting,
    Connected,
    Ended,
}

/// The status indicator shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        };
        f.write_str(status)
    }
}

impl SessionPhase {
    pub fn status(self) -> ConnectionStatus {
        match self {
            SessionPhase::Idle | SessionPhase::Ended => ConnectionStatus::Disconnected,
            SessionPhase::Connecting => ConnectionStatus::Connecting,
            SessionPhase::Connected => ConnectionStatus::Connected,
        }
    }
}

/// Everything the user can see about one play session.
///
/// Owned and mutated only by the session controller; observers receive
/// clones through a `watch` channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub agent_mode: AgentMode,
    pub remaining_seconds: Option<i64>,
    pub motion: MotionDiagnostics,
    pub error: Option<String>,
}

impl SessionState {
    pub fn new(threshold: f64) -> Self {
        Self {
            phase: SessionPhase::Idle,
            agent_mode: AgentMode::default(),
            remaining_seconds: None,
            motion: MotionDiagnostics {
                availability: MotionAvailability::Unknown,
                listening: false,
                intensity: 0.0,
                threshold,
                sample_count: 0,
                last_shake_at: None,
            },
            error: None,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.phase.status()
    }

    pub fn last_shake_at(&self) -> Option<Instant> {
        self.motion.last_shake_at
    }

    pub fn time_display(&self) -> String {
        match self.remaining_seconds {
            Some(remaining) if remaining > 0 => format!("Time remaining: {remaining}s"),
            _ => "Time is up!".to_string(),
        }
    }

    /// Moves forward to `next`. Phases never move backwards; a rejected
    /// transition returns `false` and leaves the state untouched.
    pub(crate) fn advance(&mut self, next: SessionPhase) -> bool {
        if next <= self.phase {
            return false;
        }
        tracing::info!(from = ?self.phase, to = ?next, "session phase change");
        self.phase = next;
        if next != SessionPhase::Ended {
            self.error = None;
        }
        true
    }
}

/// Why a connected session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    RemoteDisconnect(Option<String>),
    RemoteError(String),
    /// The wrap-up grace period ran out.
    HardStop,
    /// The agent called the end-call tool.
    EndCallTool(String),
    UserRestart,
    UserLeave,
    /// The host dropped its side of the session.
    HostClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Connecting failed; nothing was left running.
    Aborted(SessionError),
    Ended(EndReason),
}

impl SessionOutcome {
    /// Whether the host should open a fresh session. Everything except an
    /// explicit leave or a failed connect starts over from a clean state.
    pub fn should_restart(&self) -> bool {
        match self {
            SessionOutcome::Aborted(_) => false,
            SessionOutcome::Ended(EndReason::UserLeave | EndReason::HostClosed) => false,
            SessionOutcome::Ended(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_only_move_forward() {
        let mut state = SessionState::new(0.5);
        assert!(state.advance(SessionPhase::Connecting));
        assert!(state.advance(SessionPhase::Connected));
        assert!(!state.advance(SessionPhase::Connecting));
        assert!(!state.advance(SessionPhase::Connected));
        assert!(state.advance(SessionPhase::Ended));
        assert!(!state.advance(SessionPhase::Ended));
        assert_eq!(state.phase, SessionPhase::Ended);
    }

    #[test]
    fn successful_transitions_clear_the_error_but_ending_keeps_it() {
        let mut state = SessionState::new(0.5);
        state.error = Some("stale".to_string());
        state.advance(SessionPhase::Connecting);
        assert_eq!(state.error, None);

        state.error = Some("socket reset".to_string());
        state.advance(SessionPhase::Ended);
        assert_eq!(state.error.as_deref(), Some("socket reset"));
    }

    #[test]
    fn status_indicator_follows_the_phase() {
        assert_eq!(SessionPhase::Idle.status().to_string(), "disconnected");
        assert_eq!(SessionPhase::Connecting.status().to_string(), "connecting");
        assert_eq!(SessionPhase::Connected.status().to_string(), "connected");
        assert_eq!(SessionPhase::Ended.status().to_string(), "disconnected");
    }

    #[test]
    fn time_display_reports_time_up_without_a_positive_budget() {
        let mut state = SessionState::new(0.5);
        assert_eq!(state.time_display(), "Time is up!");
        state.remaining_seconds = Some(20);
        assert_eq!(state.time_display(), "Time remaining: 20s");
        state.remaining_seconds = Some(0);
        assert_eq!(state.time_display(), "Time is up!");
    }

    #[test]
    fn only_leaving_or_failing_stops_the_host() {
        assert!(SessionOutcome::Ended(EndReason::HardStop).should_restart());
        assert!(SessionOutcome::Ended(EndReason::RemoteError("x".into())).should_restart());
        assert!(SessionOutcome::Ended(EndReason::EndCallTool("Avsluta".into())).should_restart());
        assert!(SessionOutcome::Ended(EndReason::UserRestart).should_restart());
        assert!(!SessionOutcome::Ended(EndReason::UserLeave).should_restart());
        assert!(!SessionOutcome::Ended(EndReason::HostClosed).should_restart());
        assert!(!SessionOutcome::Aborted(SessionError::Configuration).should_restart());
    }
}
