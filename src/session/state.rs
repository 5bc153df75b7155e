//! Session state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle of a streaming session.
///
/// Idle → Connecting → Streaming → Disconnected, with Failed reachable from
/// Connecting. Disconnected and Failed are terminal until the next start;
/// stop resets any state back to Idle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
    Disconnected,
    Failed(String),
}

impl SessionState {
    /// A session is in flight: starting another one is a no-op.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Streaming)
    }

    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        use SessionState::*;
        match (self, target) {
            // stop resets anything to Idle
            (_, Idle) => true,
            // start
            (Idle, Connecting) | (Disconnected, Connecting) | (Failed(_), Connecting) => true,
            // transport events
            (Connecting, Streaming) | (Connecting, Failed(_)) => true,
            (Streaming, Disconnected) => true,
            _ => false,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Streaming => write!(f, "streaming"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_states() {
        assert!(SessionState::Connecting.is_active());
        assert!(SessionState::Streaming.is_active());
        assert!(!SessionState::Idle.is_active());
        assert!(!SessionState::Disconnected.is_active());
        assert!(!SessionState::Failed("x".into()).is_active());
    }

    #[test]
    fn valid_transitions() {
        use SessionState::*;
        let transitions = [
            (Idle, Connecting),
            (Connecting, Streaming),
            (Connecting, Failed("boom".into())),
            (Streaming, Disconnected),
            (Disconnected, Connecting),
            (Failed("boom".into()), Connecting),
        ];
        for (from, to) in transitions {
            assert!(from.can_transition_to(&to), "{from} should reach {to}");
        }
    }

    #[test]
    fn stop_resets_any_state_to_idle() {
        use SessionState::*;
        for state in [
            Idle,
            Connecting,
            Streaming,
            Disconnected,
            Failed("boom".into()),
        ] {
            assert!(state.can_transition_to(&Idle));
        }
    }

    #[test]
    fn invalid_transitions() {
        use SessionState::*;
        assert!(!Idle.can_transition_to(&Streaming));
        assert!(!Streaming.can_transition_to(&Connecting));
        assert!(!Disconnected.can_transition_to(&Streaming));
        assert!(!Failed("x".into()).can_transition_to(&Streaming));
    }

    #[test]
    fn display_includes_failure_reason() {
        let state = SessionState::Failed("token expired".into());
        assert_eq!(state.to_string(), "failed: token expired");
    }
}
