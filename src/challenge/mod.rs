//! Challenges
//!
//! A challenge is a goal measured in planned focus cycles. The engine drives
//! cycles against one selected challenge and marks it complete when the
//! last planned cycle ends.

pub mod book;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cycle::kind::CycleType;

pub use book::ChallengeBook;

/// Focus length applied to every challenge, in minutes
pub const FOCUS_MINUTES: u32 = 25;

/// Challenge category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Job-related goals
    Work,
    /// Learning goals
    Study,
    /// Personal projects
    Personal,
    /// Exercise and wellbeing
    Health,
    /// Anything else
    #[default]
    Other,
}

impl Category {
    /// Lowercase label, matching the serialized form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Study => "study",
            Self::Personal => "personal",
            Self::Health => "health",
            Self::Other => "other",
        }
    }
}

/// Challenge priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority
    Low,
    /// Medium priority
    Medium,
    /// High priority
    High,
}

/// A persisted challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Opaque unique id
    pub id: String,
    /// Non-empty title
    pub title: String,
    /// Optional free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Category
    #[serde(default)]
    pub category: Category,
    /// Priority
    pub priority: Priority,
    /// Focus cycles needed to finish (at least 1)
    pub planned_cycles: u32,
    /// Focus cycles finished so far
    #[serde(default)]
    pub completed_cycles: u32,
    /// Set once, never cleared by the engine
    #[serde(default)]
    pub completed: bool,
    /// Day the challenge was created
    pub created_date: NaiveDate,
    /// Day the challenge was completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<NaiveDate>,
    /// Focus length in minutes
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u32,
    /// Short break length in minutes
    pub short_break_minutes: u32,
    /// Long break length in minutes
    pub long_break_minutes: u32,
}

const fn default_focus_minutes() -> u32 {
    FOCUS_MINUTES
}

impl Challenge {
    /// Cycle length for this challenge, in minutes
    #[must_use]
    pub const fn minutes_for(&self, cycle: CycleType) -> u32 {
        match cycle {
            CycleType::Focus => self.focus_minutes,
            CycleType::ShortBreak => self.short_break_minutes,
            CycleType::LongBreak => self.long_break_minutes,
        }
    }

    /// Cycles still to go before completion
    #[must_use]
    pub const fn remaining_cycles(&self) -> u32 {
        self.planned_cycles.saturating_sub(self.completed_cycles)
    }
}

/// User input for creating or editing a challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChallenge {
    /// Title (trimmed, must be non-empty)
    pub title: String,
    /// Optional description
    pub description: Option<String>,
    /// Category
    pub category: Category,
    /// Priority
    pub priority: Priority,
    /// Planned focus cycles (at least 1)
    pub planned_cycles: u32,
    /// Short break length in minutes
    pub short_break_minutes: u32,
    /// Long break length in minutes
    pub long_break_minutes: u32,
}

impl NewChallenge {
    /// Input with the default 5/15 minute breaks
    #[must_use]
    pub fn new(title: &str, planned_cycles: u32) -> Self {
        Self {
            title: title.to_string(),
            description: None,
            category: Category::Other,
            priority: Priority::Medium,
            planned_cycles,
            short_break_minutes: 5,
            long_break_minutes: 15,
        }
    }

    /// Check the input and return the trimmed title
    pub(crate) fn validated_title(&self) -> Result<String> {
        let title = self.title.trim();
        if title.is_empty() {
            bail!("Challenge title cannot be empty");
        }
        if self.planned_cycles == 0 {
            bail!("Challenge '{title}' must plan at least 1 cycle");
        }
        if self.short_break_minutes == 0 || self.long_break_minutes == 0 {
            bail!("Challenge '{title}' break lengths must be at least 1 minute");
        }
        Ok(title.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::sample_challenge;

    #[test]
    fn test_round_trip_through_json() {
        let mut challenge = sample_challenge("c-1", 3);
        challenge.description = Some("Write chapter two".to_string());
        challenge.completed_date = NaiveDate::from_ymd_opt(2025, 3, 9);

        let json = serde_json::to_string(&challenge).unwrap();
        let back: Challenge = serde_json::from_str(&json).unwrap();
        assert_eq!(back, challenge);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = r#"{
            "id": "c-9",
            "title": "Read",
            "priority": "low",
            "planned_cycles": 2,
            "created_date": "2025-01-02",
            "short_break_minutes": 5,
            "long_break_minutes": 15
        }"#;
        let challenge: Challenge = serde_json::from_str(json).unwrap();
        assert_eq!(challenge.category, Category::Other);
        assert_eq!(challenge.completed_cycles, 0);
        assert!(!challenge.completed);
        assert_eq!(challenge.focus_minutes, FOCUS_MINUTES);
        assert_eq!(challenge.remaining_cycles(), 2);
    }

    #[test]
    fn test_minutes_for_uses_challenge_lengths() {
        let mut challenge = sample_challenge("c-1", 1);
        challenge.short_break_minutes = 7;
        challenge.long_break_minutes = 20;
        assert_eq!(challenge.minutes_for(CycleType::Focus), 25);
        assert_eq!(challenge.minutes_for(CycleType::ShortBreak), 7);
        assert_eq!(challenge.minutes_for(CycleType::LongBreak), 20);
    }

    #[test]
    fn test_validated_title_trims() {
        let input = NewChallenge::new("  Learn Rust  ", 4);
        assert_eq!(input.validated_title().unwrap(), "Learn Rust");
    }

    #[test]
    fn test_reject_blank_title() {
        let err = NewChallenge::new("   ", 4).validated_title().unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_reject_zero_planned_cycles() {
        let err = NewChallenge::new("Run", 0).validated_title().unwrap_err();
        assert!(err.to_string().contains("at least 1 cycle"));
    }
}
