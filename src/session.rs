//! Session log entries
//!
//! One session is appended for every cycle the engine finishes, whether the
//! countdown expired or the user skipped ahead.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cycle::kind::CycleType;

/// A finished cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique id
    pub id: String,
    /// Challenge the cycle counted towards, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_id: Option<String>,
    /// Which phase ended
    #[serde(rename = "type")]
    pub kind: CycleType,
    /// Planned length of the cycle in minutes
    pub duration_minutes: u32,
    /// When the cycle started
    pub started_at: DateTime<Utc>,
    /// When the cycle ended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// False for interrupted cycles
    #[serde(default)]
    pub completed: bool,
}

impl Session {
    /// Record a cycle that just ended at `ended_at`.
    ///
    /// The start time is back-dated by the full planned length.
    #[must_use]
    pub fn finished(
        kind: CycleType,
        duration_minutes: u32,
        challenge_id: Option<String>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            challenge_id,
            kind,
            duration_minutes,
            started_at: ended_at - Duration::minutes(i64::from(duration_minutes)),
            ended_at: Some(ended_at),
            completed: true,
        }
    }

    /// True for completed focus sessions, the unit statistics count
    #[must_use]
    pub fn is_completed_focus(&self) -> bool {
        self.completed && self.kind == CycleType::Focus
    }
}
