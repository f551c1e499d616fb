//! Cycle types and the break cadence rule

use std::fmt;

use serde::{Deserialize, Serialize};

/// The phase a countdown belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CycleType {
    /// Working period
    Focus,
    /// Break after most focus cycles
    ShortBreak,
    /// Break after every Nth focus cycle
    LongBreak,
}

impl CycleType {
    /// Returns true for either break type
    #[must_use]
    pub const fn is_break(self) -> bool {
        matches!(self, Self::ShortBreak | Self::LongBreak)
    }

    /// Stable kebab-case label, matching the serialized form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::ShortBreak => "short-break",
            Self::LongBreak => "long-break",
        }
    }
}

impl fmt::Display for CycleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the break that follows a completed focus cycle.
///
/// `completed_cycle` is the 1-indexed number of the focus cycle that just
/// ended. A zero cadence never yields a long break.
#[must_use]
pub const fn break_after_focus(completed_cycle: u32, long_break_every: u32) -> CycleType {
    if long_break_every != 0 && completed_cycle % long_break_every == 0 {
        CycleType::LongBreak
    } else {
        CycleType::ShortBreak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_fourth_focus_gets_long_break() {
        assert_eq!(break_after_focus(1, 4), CycleType::ShortBreak);
        assert_eq!(break_after_focus(3, 4), CycleType::ShortBreak);
        assert_eq!(break_after_focus(4, 4), CycleType::LongBreak);
        assert_eq!(break_after_focus(5, 4), CycleType::ShortBreak);
        assert_eq!(break_after_focus(8, 4), CycleType::LongBreak);
    }

    #[test]
    fn test_zero_cadence_never_long() {
        assert_eq!(break_after_focus(4, 0), CycleType::ShortBreak);
    }

    #[test]
    fn test_serializes_as_kebab_case() {
        let json = serde_json::to_string(&CycleType::ShortBreak).unwrap();
        assert_eq!(json, "\"short-break\"");
        let parsed: CycleType = serde_json::from_str("\"long-break\"").unwrap();
        assert_eq!(parsed, CycleType::LongBreak);
    }

    #[test]
    fn test_display_matches_serialized_label() {
        assert_eq!(CycleType::Focus.to_string(), "focus");
        assert_eq!(CycleType::LongBreak.to_string(), "long-break");
        assert!(CycleType::LongBreak.is_break());
        assert!(!CycleType::Focus.is_break());
    }
}
