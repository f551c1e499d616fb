//! Typed access to the persisted blobs
//!
//! Reads are tolerant: a missing key or a blob that fails to parse is
//! treated as "no data" and logged, never returned as an error. Only a
//! failure of the store itself surfaces as `Err`, so callers can tell
//! "empty" apart from "unreachable" and fall back to in-memory state.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{
    KeyValueStore, BACKUP_KEY, CHALLENGES_KEY, CONFIG_KEY, CURRENT_CHALLENGE_KEY,
    DAILY_STATS_KEY, MAX_FOCUS_KEY, SESSIONS_KEY, STREAK_KEY, TOTAL_STATS_KEY,
};
use crate::challenge::Challenge;
use crate::session::Session;

/// User preferences stored under [`CONFIG_KEY`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Deliver end-of-cycle notifications
    #[serde(default = "default_true")]
    pub notifications: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            notifications: true,
        }
    }
}

/// Focus cycles and minutes logged on one day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTally {
    /// Day the tally belongs to
    pub date: NaiveDate,
    /// Focus cycles completed that day
    pub cycles: u32,
    /// Focus minutes completed that day
    pub minutes: u32,
}

/// Focus cycles and minutes logged since the store was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalTally {
    /// All focus cycles completed
    #[serde(default)]
    pub cycles: u32,
    /// All focus minutes completed
    #[serde(default)]
    pub minutes: u32,
}

/// Run of consecutive days with at least one completed focus cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    /// Length of the run in days
    #[serde(default)]
    pub days: u32,
    /// Last day a focus cycle was completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed: Option<NaiveDate>,
}

/// Raw copies of the primary blobs, stored under [`BACKUP_KEY`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    /// Format version
    pub version: String,
    /// When the snapshot was taken
    pub saved_at: DateTime<Utc>,
    /// Challenge list blob
    #[serde(default)]
    pub challenges: Option<String>,
    /// Session log blob
    #[serde(default)]
    pub sessions: Option<String>,
    /// Preferences blob
    #[serde(default)]
    pub preferences: Option<String>,
    /// Selected challenge blob
    #[serde(default)]
    pub current_challenge: Option<String>,
}

const BACKUP_VERSION: &str = "1.0";

/// JSON view over a [`KeyValueStore`]
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn KeyValueStore>,
}

impl Repository {
    /// Wrap a store
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Decode a blob, substituting `None` for missing or malformed data
    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self
            .store
            .get(key)
            .with_context(|| format!("Failed to read '{key}'"))?
        else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::warn!(key, %err, "ignoring malformed blob");
                Ok(None)
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize '{key}'"))?;
        self.store
            .set(key, &json)
            .with_context(|| format!("Failed to write '{key}'"))
    }

    /// All challenges, in stored order
    pub fn challenges(&self) -> Result<Vec<Challenge>> {
        Ok(self.read_json(CHALLENGES_KEY)?.unwrap_or_default())
    }

    /// Look up one challenge by id
    pub fn challenge(&self, id: &str) -> Result<Option<Challenge>> {
        Ok(self.challenges()?.into_iter().find(|c| c.id == id))
    }

    /// Challenges not yet completed, in stored order
    pub fn pending_challenges(&self) -> Result<Vec<Challenge>> {
        Ok(self
            .challenges()?
            .into_iter()
            .filter(|c| !c.completed)
            .collect())
    }

    /// Replace the whole challenge list
    pub fn save_challenges(&self, challenges: &[Challenge]) -> Result<()> {
        self.write_json(CHALLENGES_KEY, challenges)
    }

    /// Apply `update` to the challenge with `id` and persist the list.
    ///
    /// Returns the updated challenge, or `None` if no such challenge exists
    /// (nothing is written in that case).
    pub fn update_challenge<F>(&self, id: &str, update: F) -> Result<Option<Challenge>>
    where
        F: FnOnce(&mut Challenge),
    {
        let mut challenges = self.challenges()?;
        let Some(challenge) = challenges.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        update(challenge);
        let updated = challenge.clone();
        self.save_challenges(&challenges)?;
        Ok(Some(updated))
    }

    /// Full session log
    pub fn sessions(&self) -> Result<Vec<Session>> {
        Ok(self.read_json(SESSIONS_KEY)?.unwrap_or_default())
    }

    /// Append one session to the log
    pub fn append_session(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions()?;
        sessions.push(session.clone());
        self.save_sessions(&sessions)
    }

    /// Replace the whole session log
    pub fn save_sessions(&self, sessions: &[Session]) -> Result<()> {
        self.write_json(SESSIONS_KEY, sessions)
    }

    /// Id of the selected challenge, if one was persisted
    pub fn current_challenge_id(&self) -> Result<Option<String>> {
        self.read_json(CURRENT_CHALLENGE_KEY)
    }

    /// Persist or clear the selected challenge id
    pub fn set_current_challenge_id(&self, id: Option<&str>) -> Result<()> {
        match id {
            Some(id) => self.write_json(CURRENT_CHALLENGE_KEY, id),
            None => self
                .store
                .remove(CURRENT_CHALLENGE_KEY)
                .with_context(|| format!("Failed to remove '{CURRENT_CHALLENGE_KEY}'")),
        }
    }

    /// Stored preferences, or defaults
    pub fn preferences(&self) -> Result<Preferences> {
        Ok(self.read_json(CONFIG_KEY)?.unwrap_or_default())
    }

    /// Persist preferences
    pub fn save_preferences(&self, preferences: &Preferences) -> Result<()> {
        self.write_json(CONFIG_KEY, preferences)
    }

    /// Stored max focus flag (off when unset)
    pub fn max_focus(&self) -> Result<bool> {
        Ok(self.read_json(MAX_FOCUS_KEY)?.unwrap_or(false))
    }

    /// Persist the max focus flag
    pub fn set_max_focus(&self, enabled: bool) -> Result<()> {
        self.write_json(MAX_FOCUS_KEY, &enabled)
    }

    /// Today's tally; a tally stored for an earlier day reads as zero
    pub fn daily_tally(&self, today: NaiveDate) -> Result<DailyTally> {
        let fresh = DailyTally {
            date: today,
            cycles: 0,
            minutes: 0,
        };
        Ok(self
            .read_json::<DailyTally>(DAILY_STATS_KEY)?
            .filter(|tally| tally.date == today)
            .unwrap_or(fresh))
    }

    /// All-time tally
    pub fn total_tally(&self) -> Result<TotalTally> {
        Ok(self.read_json(TOTAL_STATS_KEY)?.unwrap_or_default())
    }

    /// Count one finished focus cycle in both tallies
    pub fn record_focus(&self, minutes: u32, today: NaiveDate) -> Result<()> {
        let mut daily = self.daily_tally(today)?;
        daily.cycles = daily.cycles.saturating_add(1);
        daily.minutes = daily.minutes.saturating_add(minutes);
        self.write_json(DAILY_STATS_KEY, &daily)?;

        let mut total = self.total_tally()?;
        total.cycles = total.cycles.saturating_add(1);
        total.minutes = total.minutes.saturating_add(minutes);
        self.write_json(TOTAL_STATS_KEY, &total)
    }

    /// Stored streak
    pub fn streak(&self) -> Result<Streak> {
        Ok(self.read_json(STREAK_KEY)?.unwrap_or_default())
    }

    /// Count `today` in the streak.
    ///
    /// The run grows by one when the previous completion was yesterday,
    /// stays as is for a second completion on the same day, and restarts
    /// at 1 otherwise.
    pub fn record_streak(&self, today: NaiveDate) -> Result<Streak> {
        let mut streak = self.streak()?;
        let yesterday = today.pred_opt();
        streak.days = match streak.last_completed {
            Some(last) if last == today => streak.days.max(1),
            Some(last) if Some(last) == yesterday => streak.days.saturating_add(1),
            _ => 1,
        };
        streak.last_completed = Some(today);
        self.write_json(STREAK_KEY, &streak)?;
        Ok(streak)
    }

    /// Copy the challenge, session, preferences and selection blobs into
    /// one snapshot under [`BACKUP_KEY`]
    pub fn backup(&self, now: DateTime<Utc>) -> Result<Backup> {
        let raw = |key: &str| {
            self.store
                .get(key)
                .with_context(|| format!("Failed to read '{key}' for backup"))
        };
        let backup = Backup {
            version: BACKUP_VERSION.to_string(),
            saved_at: now,
            challenges: raw(CHALLENGES_KEY)?,
            sessions: raw(SESSIONS_KEY)?,
            preferences: raw(CONFIG_KEY)?,
            current_challenge: raw(CURRENT_CHALLENGE_KEY)?,
        };
        self.write_json(BACKUP_KEY, &backup)?;
        Ok(backup)
    }

    /// Put back the challenge list and session log from the last backup
    /// where they are missing. Existing blobs are never overwritten.
    ///
    /// Returns the keys that were restored.
    pub fn restore_missing(&self) -> Result<Vec<&'static str>> {
        let Some(backup) = self.read_json::<Backup>(BACKUP_KEY)? else {
            return Ok(Vec::new());
        };

        let mut restored = Vec::new();
        for (key, blob) in [
            (CHALLENGES_KEY, backup.challenges),
            (SESSIONS_KEY, backup.sessions),
        ] {
            let Some(blob) = blob else { continue };
            let present = self
                .store
                .get(key)
                .with_context(|| format!("Failed to read '{key}'"))?
                .is_some();
            if !present {
                self.store
                    .set(key, &blob)
                    .with_context(|| format!("Failed to restore '{key}'"))?;
                restored.push(key);
            }
        }

        if !restored.is_empty() {
            tracing::info!(keys = ?restored, saved_at = %backup.saved_at, "restored from backup");
        }
        Ok(restored)
    }

    /// Reset today's tally to zero
    pub fn reset_daily_tally(&self, today: NaiveDate) -> Result<()> {
        self.write_json(
            DAILY_STATS_KEY,
            &DailyTally {
                date: today,
                cycles: 0,
                minutes: 0,
            },
        )
    }
}
