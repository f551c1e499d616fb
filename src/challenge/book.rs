//! Challenge management
//!
//! All challenge mutations outside the engine go through [`ChallengeBook`],
//! which writes through the repository and then tells other instances about
//! it on both bus channels.

use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use super::{Challenge, NewChallenge, FOCUS_MINUTES};
use crate::clock::Clock;
use crate::events::{ChallengeChange, Event, EventBus};
use crate::store::{KeyValueStore, Repository, CHALLENGES_KEY};

/// Create, edit, complete and delete challenges
pub struct ChallengeBook {
    repo: Repository,
    bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
}

impl ChallengeBook {
    /// Book over `store`, announcing changes on `bus`
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, bus: Arc<dyn EventBus>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo: Repository::new(store),
            bus,
            clock,
        }
    }

    /// All challenges, in creation order
    pub fn list(&self) -> Result<Vec<Challenge>> {
        self.repo.challenges()
    }

    /// Challenges not yet completed
    pub fn pending(&self) -> Result<Vec<Challenge>> {
        self.repo.pending_challenges()
    }

    /// Validate `input` and append a new challenge
    pub fn create(&self, input: &NewChallenge) -> Result<Challenge> {
        let title = input.validated_title()?;
        let challenge = Challenge {
            id: Uuid::new_v4().to_string(),
            title,
            description: clean_description(input.description.as_deref()),
            category: input.category,
            priority: input.priority,
            planned_cycles: input.planned_cycles,
            completed_cycles: 0,
            completed: false,
            created_date: self.clock.now().date_naive(),
            completed_date: None,
            focus_minutes: FOCUS_MINUTES,
            short_break_minutes: input.short_break_minutes,
            long_break_minutes: input.long_break_minutes,
        };

        let mut challenges = self.repo.challenges()?;
        challenges.push(challenge.clone());
        self.repo
            .save_challenges(&challenges)
            .context("Failed to save new challenge")?;

        tracing::info!(challenge = %challenge.id, title = %challenge.title, "challenge created");
        self.announce(ChallengeChange::Created, &challenge.id);
        Ok(challenge)
    }

    /// Replace the editable fields of an existing challenge.
    ///
    /// Progress is kept, but never exceeds the new plan.
    pub fn edit(&self, id: &str, input: &NewChallenge) -> Result<Challenge> {
        let title = input.validated_title()?;
        let updated = self
            .repo
            .update_challenge(id, |challenge| {
                challenge.title = title;
                challenge.description = clean_description(input.description.as_deref());
                challenge.category = input.category;
                challenge.priority = input.priority;
                challenge.planned_cycles = input.planned_cycles;
                challenge.completed_cycles = challenge.completed_cycles.min(input.planned_cycles);
                challenge.short_break_minutes = input.short_break_minutes;
                challenge.long_break_minutes = input.long_break_minutes;
            })?
            .with_context(|| format!("Challenge '{id}' not found"))?;

        tracing::info!(challenge = id, "challenge edited");
        self.announce(ChallengeChange::Edited, id);
        Ok(updated)
    }

    /// Mark a challenge completed by hand.
    ///
    /// Completing an already completed challenge changes nothing and
    /// publishes nothing.
    pub fn complete(&self, id: &str) -> Result<Challenge> {
        let existing = self
            .repo
            .challenge(id)?
            .with_context(|| format!("Challenge '{id}' not found"))?;
        if existing.completed {
            return Ok(existing);
        }

        let today = self.clock.now().date_naive();
        let updated = self
            .repo
            .update_challenge(id, |challenge| {
                challenge.completed = true;
                challenge.completed_cycles = challenge.planned_cycles;
                challenge.completed_date = Some(today);
            })?
            .with_context(|| format!("Challenge '{id}' not found"))?;

        tracing::info!(challenge = id, "challenge completed by hand");
        self.announce(ChallengeChange::Completed, id);
        Ok(updated)
    }

    /// Remove a challenge. Returns false if it did not exist.
    ///
    /// Sessions logged against it are kept; see
    /// [`crate::stats::prune_orphan_sessions`].
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut challenges = self.repo.challenges()?;
        let before = challenges.len();
        challenges.retain(|c| c.id != id);
        if challenges.len() == before {
            return Ok(false);
        }
        self.repo
            .save_challenges(&challenges)
            .with_context(|| format!("Failed to delete challenge '{id}'"))?;

        tracing::info!(challenge = id, "challenge deleted");
        self.announce(ChallengeChange::Deleted, id);
        Ok(true)
    }

    fn announce(&self, kind: ChallengeChange, id: &str) {
        self.bus.publish(Event::ChallengeChanged {
            kind,
            id: id.to_string(),
        });
        self.bus.publish(Event::storage_sync(CHALLENGES_KEY));
    }
}

fn clean_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{Category, Priority};
    use crate::clock::ManualClock;
    use crate::events::LocalBus;
    use crate::store::MemoryStore;
    use chrono::{NaiveDate, TimeZone, Utc};

    struct Fixture {
        bus: Arc<LocalBus>,
        book: ChallengeBook,
    }

    fn fixture() -> Fixture {
        let bus = Arc::new(LocalBus::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 4, 10, 12, 0, 0).unwrap(),
        ));
        let book = ChallengeBook::new(Arc::new(MemoryStore::new()), bus.clone(), clock);
        Fixture { bus, book }
    }

    #[test]
    fn test_create_fills_defaults_and_announces() {
        let f = fixture();
        let mut input = NewChallenge::new("  Learn Rust ", 3);
        input.description = Some("   ".to_string());
        input.category = Category::Study;
        input.priority = Priority::High;

        let created = f.book.create(&input).unwrap();

        assert_eq!(created.title, "Learn Rust");
        assert_eq!(created.description, None);
        assert_eq!(created.focus_minutes, 25);
        assert_eq!(created.completed_cycles, 0);
        assert_eq!(created.created_date, NaiveDate::from_ymd_opt(2025, 4, 10).unwrap());
        assert_eq!(f.book.list().unwrap(), vec![created.clone()]);
        assert_eq!(
            f.bus.published(),
            vec![
                Event::ChallengeChanged {
                    kind: ChallengeChange::Created,
                    id: created.id
                },
                Event::storage_sync(CHALLENGES_KEY),
            ]
        );
    }

    #[test]
    fn test_create_rejects_invalid_input() {
        let f = fixture();
        assert!(f.book.create(&NewChallenge::new("", 3)).is_err());
        assert!(f.book.create(&NewChallenge::new("Run", 0)).is_err());
        assert!(f.book.list().unwrap().is_empty());
        assert!(f.bus.published().is_empty());
    }

    #[test]
    fn test_edit_clamps_progress_to_plan() {
        let f = fixture();
        let created = f.book.create(&NewChallenge::new("Write", 6)).unwrap();
        f.book
            .repo
            .update_challenge(&created.id, |c| c.completed_cycles = 5)
            .unwrap();

        let mut input = NewChallenge::new("Write more", 3);
        input.short_break_minutes = 8;
        let edited = f.book.edit(&created.id, &input).unwrap();

        assert_eq!(edited.title, "Write more");
        assert_eq!(edited.planned_cycles, 3);
        assert_eq!(edited.completed_cycles, 3);
        assert_eq!(edited.short_break_minutes, 8);
        assert!(f.bus.published().contains(&Event::ChallengeChanged {
            kind: ChallengeChange::Edited,
            id: created.id
        }));
    }

    #[test]
    fn test_edit_missing_challenge_fails() {
        let f = fixture();
        let err = f.book.edit("nope", &NewChallenge::new("x", 1)).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_complete_is_idempotent() {
        let f = fixture();
        let created = f.book.create(&NewChallenge::new("Walk", 4)).unwrap();

        let done = f.book.complete(&created.id).unwrap();
        assert!(done.completed);
        assert_eq!(done.completed_cycles, 4);
        assert!(done.completed_date.is_some());
        assert!(f.book.pending().unwrap().is_empty());

        let published = f.bus.published().len();
        f.book.complete(&created.id).unwrap();
        assert_eq!(f.bus.published().len(), published);
    }

    #[test]
    fn test_delete() {
        let f = fixture();
        let keep = f.book.create(&NewChallenge::new("Keep", 1)).unwrap();
        let drop = f.book.create(&NewChallenge::new("Drop", 1)).unwrap();

        assert!(f.book.delete(&drop.id).unwrap());
        assert!(!f.book.delete(&drop.id).unwrap());

        assert_eq!(f.book.list().unwrap(), vec![keep]);
        assert!(f.bus.published().contains(&Event::ChallengeChanged {
            kind: ChallengeChange::Deleted,
            id: drop.id
        }));
    }
}
