//! Read-only engine snapshot and UI-facing signals

use serde::{Deserialize, Serialize};

use crate::cycle::kind::CycleType;

/// Countdown run state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Not counting; `start` arms the countdown
    #[default]
    Idle,
    /// Counting down
    Running,
    /// Halted mid-cycle; `start` resumes with the same remaining time
    Paused,
}

/// Snapshot handed to presentation layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleState {
    /// Seconds left in the current cycle
    pub remaining_seconds: u64,
    /// Current phase
    pub cycle_type: CycleType,
    /// Countdown run state
    pub run_state: RunState,
    /// 1-indexed focus cycle counter, never above `total_cycles`
    pub current_cycle: u32,
    /// Planned cycles of the selected challenge (or the configured default)
    pub total_cycles: u32,
    /// Selected challenge
    pub selected_challenge_id: Option<String>,
    /// Set when the last planned cycle of a challenge ended
    pub challenge_completed: bool,
    /// Celebration overlay requested
    pub celebration_visible: bool,
    /// Pause and skip are refused during focus while this is on
    pub max_focus: bool,
}

impl CycleState {
    /// True while running or paused (a cycle is in progress)
    #[must_use]
    pub const fn running(&self) -> bool {
        matches!(self.run_state, RunState::Running | RunState::Paused)
    }

    /// True only while paused
    #[must_use]
    pub const fn paused(&self) -> bool {
        matches!(self.run_state, RunState::Paused)
    }
}

/// Informational signals for the UI, drained with `CycleEngine::take_notices`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "notice", rename_all = "kebab-case")]
pub enum Notice {
    /// Nothing left to work on: the user should create a challenge
    NoChallengeAvailable,
    /// The selected challenge disappeared or was completed elsewhere
    ChallengeUnavailable {
        /// The dropped challenge id
        id: String,
    },
    /// A pending challenge was selected automatically
    AutoSelected {
        /// The new selection
        id: String,
    },
    /// The selected challenge reached its planned cycles
    ChallengeCompleted {
        /// Challenge id
        id: String,
        /// Challenge title
        title: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(run_state: RunState) -> CycleState {
        CycleState {
            remaining_seconds: 1500,
            cycle_type: CycleType::Focus,
            run_state,
            current_cycle: 1,
            total_cycles: 4,
            selected_challenge_id: None,
            challenge_completed: false,
            celebration_visible: false,
            max_focus: false,
        }
    }

    #[test]
    fn test_running_and_paused_flags() {
        assert!(!state(RunState::Idle).running());
        assert!(state(RunState::Running).running());
        assert!(!state(RunState::Running).paused());
        assert!(state(RunState::Paused).running());
        assert!(state(RunState::Paused).paused());
    }

    #[test]
    fn test_notice_json_shape() {
        let json = serde_json::to_string(&Notice::AutoSelected {
            id: "c-2".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"notice":"auto-selected","id":"c-2"}"#);
    }
}
