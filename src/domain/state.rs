//! Orchestration controller states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of the orchestration controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    Classifying,
    Planning,
    Executing,
    Coordinating,
    Verifying,
    /// Fresh test run reported zero failures
    Done,
    /// Cycle budget exhausted with failures remaining
    FailedMaxCycles,
}

impl ControllerState {
    /// Returns true for states the controller never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ControllerState::Done | ControllerState::FailedMaxCycles)
    }

    /// Legal edges of the state machine.
    pub fn can_transition_to(&self, next: ControllerState) -> bool {
        use ControllerState::*;
        matches!(
            (self, next),
            (Idle, Classifying)
                | (Classifying, Planning)
                | (Classifying, Verifying)
                | (Planning, Executing)
                | (Executing, Coordinating)
                | (Coordinating, Verifying)
                | (Verifying, Done)
                | (Verifying, Idle)
                | (Verifying, FailedMaxCycles)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerState::Idle => "idle",
            ControllerState::Classifying => "classifying",
            ControllerState::Planning => "planning",
            ControllerState::Executing => "executing",
            ControllerState::Coordinating => "coordinating",
            ControllerState::Verifying => "verifying",
            ControllerState::Done => "done",
            ControllerState::FailedMaxCycles => "failed_max_cycles",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ControllerState::*;

    #[test]
    fn test_terminal_states() {
        assert!(Done.is_terminal());
        assert!(FailedMaxCycles.is_terminal());
        for state in [Idle, Classifying, Planning, Executing, Coordinating, Verifying] {
            assert!(!state.is_terminal(), "{} should not be terminal", state);
        }
    }

    #[test]
    fn test_happy_path_edges() {
        let path = [Idle, Classifying, Planning, Executing, Coordinating, Verifying, Done];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for next in [Idle, Classifying, Verifying, Done] {
            assert!(!Done.can_transition_to(next));
            assert!(!FailedMaxCycles.can_transition_to(next));
        }
    }

    #[test]
    fn test_cannot_skip_execution() {
        assert!(!Planning.can_transition_to(Verifying));
        assert!(!Idle.can_transition_to(Executing));
    }
}
