//! Aggregate statistics over the session log and challenge list
//!
//! Only completed focus sessions count. Weekdays and hours are taken from
//! the session start time in UTC.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use chrono::{Datelike, Timelike, Weekday};
use serde::Serialize;

use crate::challenge::{Category, Challenge};
use crate::session::Session;
use crate::store::Repository;

/// Sunday-first, matching [`Statistics::cycles_by_weekday`]
const WEEKDAYS: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

/// Derived productivity figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    /// Completed focus sessions
    pub focus_sessions: usize,
    /// Minutes across completed focus sessions
    pub focus_minutes: u64,
    /// All challenges
    pub challenges: usize,
    /// Completed challenges
    pub completed_challenges: usize,
    /// Challenges still open
    pub pending_challenges: usize,
    /// Focus minutes per day with at least one focus session, one decimal
    pub average_minutes_per_day: f64,
    /// Focus sessions per weekday, Sunday first
    pub cycles_by_weekday: [u32; 7],
    /// Weekday with the most focus sessions (earliest in the week on ties)
    pub best_weekday: Option<Weekday>,
    /// Starting hour of the busiest one-hour window (earliest on ties)
    pub best_hour: Option<u32>,
    /// Challenges per category
    pub categories: BTreeMap<Category, usize>,
}

impl Statistics {
    /// Compute everything in one pass over the inputs
    #[must_use]
    pub fn compute(sessions: &[Session], challenges: &[Challenge]) -> Self {
        let focus: Vec<&Session> = sessions.iter().filter(|s| s.is_completed_focus()).collect();
        let focus_minutes: u64 = focus.iter().map(|s| u64::from(s.duration_minutes)).sum();

        let active_days: BTreeSet<_> = focus.iter().map(|s| s.started_at.date_naive()).collect();
        #[allow(clippy::cast_precision_loss)]
        let average_minutes_per_day = if active_days.is_empty() {
            0.0
        } else {
            (focus_minutes as f64 / active_days.len() as f64 * 10.0).round() / 10.0
        };

        let mut cycles_by_weekday = [0_u32; 7];
        let mut by_hour = [0_u32; 24];
        for session in &focus {
            let day = session.started_at.weekday().num_days_from_sunday() as usize;
            cycles_by_weekday[day] += 1;
            by_hour[session.started_at.hour() as usize] += 1;
        }

        let best_weekday = busiest(&cycles_by_weekday).map(|i| WEEKDAYS[i]);
        #[allow(clippy::cast_possible_truncation)]
        let best_hour = busiest(&by_hour).map(|i| i as u32);

        let mut categories = BTreeMap::new();
        for challenge in challenges {
            *categories.entry(challenge.category).or_insert(0) += 1;
        }

        let completed_challenges = challenges.iter().filter(|c| c.completed).count();

        Self {
            focus_sessions: focus.len(),
            focus_minutes,
            challenges: challenges.len(),
            completed_challenges,
            pending_challenges: challenges.len() - completed_challenges,
            average_minutes_per_day,
            cycles_by_weekday,
            best_weekday,
            best_hour,
            categories,
        }
    }

    /// Busiest hour as a label, e.g. `9:00 - 10:00`
    #[must_use]
    pub fn best_hour_window(&self) -> Option<String> {
        self.best_hour
            .map(|hour| format!("{hour}:00 - {}:00", hour + 1))
    }
}

/// Index of the first maximum, `None` when every count is zero
fn busiest(counts: &[u32]) -> Option<usize> {
    let max = counts.iter().copied().max().filter(|&max| max > 0)?;
    counts.iter().position(|&count| count == max)
}

/// Drop sessions whose challenge no longer exists.
///
/// Sessions without a challenge are kept. Returns how many were removed;
/// nothing is written when the count is zero.
pub fn prune_orphan_sessions(repo: &Repository) -> Result<usize> {
    let known: BTreeSet<String> = repo.challenges()?.into_iter().map(|c| c.id).collect();
    let sessions = repo.sessions()?;
    let before = sessions.len();

    let kept: Vec<Session> = sessions
        .into_iter()
        .filter(|s| s.challenge_id.as_ref().is_none_or(|id| known.contains(id)))
        .collect();

    let removed = before - kept.len();
    if removed > 0 {
        repo.save_sessions(&kept)
            .context("Failed to save pruned session log")?;
        tracing::info!(removed, "pruned sessions of deleted challenges");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::kind::CycleType;
    use crate::store::MemoryStore;
    use crate::testutil::sample_challenge;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    /// Focus session that started at the given UTC day/hour in June 2025
    fn focus_at(day: u32, hour: u32, minutes: u32) -> Session {
        let start = Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap();
        Session::finished(
            CycleType::Focus,
            minutes,
            None,
            start + chrono::Duration::minutes(i64::from(minutes)),
        )
    }

    #[test]
    fn test_empty_inputs() {
        let stats = Statistics::compute(&[], &[]);
        assert_eq!(stats.focus_sessions, 0);
        assert!(stats.average_minutes_per_day.abs() < f64::EPSILON);
        assert_eq!(stats.best_weekday, None);
        assert_eq!(stats.best_hour_window(), None);
        assert!(stats.categories.is_empty());
    }

    #[test]
    fn test_counts_only_completed_focus() {
        let mut interrupted = focus_at(2, 9, 25);
        interrupted.completed = false;
        let sessions = vec![
            focus_at(2, 9, 25),
            interrupted,
            Session::finished(CycleType::ShortBreak, 5, None, Utc::now()),
        ];

        let stats = Statistics::compute(&sessions, &[]);
        assert_eq!(stats.focus_sessions, 1);
        assert_eq!(stats.focus_minutes, 25);
    }

    #[test]
    fn test_average_per_active_day_rounds_to_one_decimal() {
        // 80 minutes over three active days
        let sessions = vec![
            focus_at(2, 9, 25),
            focus_at(2, 10, 25),
            focus_at(4, 9, 20),
            focus_at(5, 9, 10),
        ];
        let stats = Statistics::compute(&sessions, &[]);
        assert!((stats.average_minutes_per_day - 26.7).abs() < 1e-9);
    }

    #[test]
    fn test_weekday_and_hour_patterns() {
        // June 1st 2025 is a Sunday, June 2nd a Monday
        let sessions = vec![
            focus_at(1, 14, 25),
            focus_at(2, 9, 25),
            focus_at(9, 9, 25),
            focus_at(9, 14, 25),
        ];
        let stats = Statistics::compute(&sessions, &[]);
        assert_eq!(stats.cycles_by_weekday, [1, 3, 0, 0, 0, 0, 0]);
        assert_eq!(stats.best_weekday, Some(Weekday::Mon));
        assert_eq!(stats.best_hour, Some(9));
        assert_eq!(stats.best_hour_window().as_deref(), Some("9:00 - 10:00"));
    }

    #[test]
    fn test_challenge_totals_and_categories() {
        let mut done = sample_challenge("a", 1);
        done.completed = true;
        done.category = Category::Work;
        let mut study = sample_challenge("b", 2);
        study.category = Category::Study;
        let other = sample_challenge("c", 3);

        let stats = Statistics::compute(&[], &[done, study, other]);
        assert_eq!(stats.challenges, 3);
        assert_eq!(stats.completed_challenges, 1);
        assert_eq!(stats.pending_challenges, 2);
        assert_eq!(stats.categories.get(&Category::Work), Some(&1));
        assert_eq!(stats.categories.get(&Category::Other), Some(&1));
        assert_eq!(stats.categories.get(&Category::Health), None);
    }

    #[test]
    fn test_prune_orphan_sessions() {
        let repo = Repository::new(Arc::new(MemoryStore::new()));
        repo.save_challenges(&[sample_challenge("kept", 2)]).unwrap();

        let now = Utc::now();
        let kept = Session::finished(CycleType::Focus, 25, Some("kept".to_string()), now);
        let orphan = Session::finished(CycleType::Focus, 25, Some("gone".to_string()), now);
        let free = Session::finished(CycleType::ShortBreak, 5, None, now);
        repo.save_sessions(&[kept.clone(), orphan, free.clone()])
            .unwrap();

        assert_eq!(prune_orphan_sessions(&repo).unwrap(), 1);
        assert_eq!(repo.sessions().unwrap(), vec![kept, free]);
        assert_eq!(prune_orphan_sessions(&repo).unwrap(), 0);
    }
}
