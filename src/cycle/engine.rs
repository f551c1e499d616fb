//! Cycle engine
//!
//! Drives focus → break → focus cycles against a selected challenge.
//! The engine owns its countdown timer and talks to the outside world only
//! through the injected collaborators, so several independent instances can
//! coexist (one per open window, or one per test).
//!
//! Persistence problems never escape the engine: reads that fail are
//! treated as "no data", writes that fail are logged and the engine carries
//! on with its in-memory state.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::challenge::Challenge;
use crate::clock::{Clock, TimerId};
use crate::cycle::config::TimerConfig;
use crate::cycle::kind::{break_after_focus, CycleType};
use crate::cycle::state::{CycleState, Notice, RunState};
use crate::error::EngineError;
use crate::events::{ChallengeChange, Event, EventBus};
use crate::notify::{Message, Notifier};
use crate::session::Session;
use crate::store::{
    KeyValueStore, Repository, CHALLENGES_KEY, CURRENT_CHALLENGE_KEY, MAX_FOCUS_KEY, SESSIONS_KEY,
};

/// External services the engine depends on
#[derive(Clone)]
pub struct Collaborators {
    /// Blob persistence
    pub store: Arc<dyn KeyValueStore>,
    /// Cross-instance signalling
    pub bus: Arc<dyn EventBus>,
    /// Notification delivery
    pub notifier: Arc<dyn Notifier>,
    /// Time and timers
    pub clock: Arc<dyn Clock>,
}

/// The pomodoro state machine
pub struct CycleEngine {
    config: TimerConfig,
    repo: Repository,
    bus: Arc<dyn EventBus>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,

    cycle_type: CycleType,
    remaining_seconds: u64,
    run_state: RunState,
    current_cycle: u32,
    total_cycles: u32,
    /// Last known copy of the selected challenge
    selected: Option<Challenge>,
    challenge_completed: bool,
    celebration_visible: bool,
    max_focus: bool,

    countdown: Option<TimerId>,
    revalidation: Option<TimerId>,
    notices: Vec<Notice>,
    announced_empty: bool,
}

impl CycleEngine {
    /// Build an idle engine on a focus cycle. Call [`Self::mount`] to
    /// restore persisted state and start the consistency checks.
    #[must_use]
    pub fn new(config: TimerConfig, collaborators: Collaborators) -> Self {
        let remaining_seconds = u64::from(config.focus_minutes) * 60;
        let total_cycles = config.default_total_cycles;
        Self {
            repo: Repository::new(collaborators.store),
            bus: collaborators.bus,
            notifier: collaborators.notifier,
            clock: collaborators.clock,
            config,
            cycle_type: CycleType::Focus,
            remaining_seconds,
            run_state: RunState::Idle,
            current_cycle: 1,
            total_cycles,
            selected: None,
            challenge_completed: false,
            celebration_visible: false,
            max_focus: false,
            countdown: None,
            revalidation: None,
            notices: Vec::new(),
            announced_empty: false,
        }
    }

    /// Restore the persisted selection and max focus flag, schedule the
    /// periodic consistency check and run it once.
    pub fn mount(&mut self) {
        match self.repo.max_focus() {
            Ok(enabled) => self.max_focus = enabled,
            Err(err) => tracing::warn!(%err, "could not restore max focus flag"),
        }

        match self.repo.current_challenge_id() {
            Ok(Some(id)) => self.select_challenge(Some(&id)),
            Ok(None) => {}
            Err(err) => tracing::warn!(%err, "could not restore selected challenge"),
        }

        if self.revalidation.is_none() {
            self.revalidation = Some(
                self.clock
                    .schedule_periodic(self.config.revalidate_interval()),
            );
        }
        self.revalidate();
    }

    /// Cancel every timer. A running countdown is left paused.
    pub fn unmount(&mut self) {
        self.disarm_countdown();
        if let Some(id) = self.revalidation.take() {
            self.clock.cancel(id);
        }
        if self.run_state == RunState::Running {
            self.run_state = RunState::Paused;
        }
    }

    /// Begin or resume the countdown.
    ///
    /// Requires a selected, incomplete challenge. The selection is checked
    /// against the store first; a challenge removed or completed elsewhere
    /// is dropped and the start refused.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.run_state == RunState::Running {
            return reject(EngineError::AlreadyRunning);
        }
        let Some(id) = self.selected_id() else {
            return reject(EngineError::NoChallengeSelected);
        };

        match self.repo.challenge(&id) {
            Ok(Some(fresh)) if !fresh.completed => self.refresh_selection(fresh),
            Ok(_) => {
                self.heal_selection(&id);
                return reject(EngineError::ChallengeUnavailable(id));
            }
            Err(err) => {
                tracing::warn!(%err, challenge = %id, "store unreachable; starting from cached challenge");
            }
        }

        self.run_state = RunState::Running;
        self.arm_countdown();
        tracing::debug!(
            cycle = %self.cycle_type,
            remaining = self.remaining_seconds,
            "countdown started"
        );
        Ok(())
    }

    /// Halt the countdown, keeping the remaining time
    pub fn pause(&mut self) -> Result<(), EngineError> {
        match self.run_state {
            RunState::Idle => return reject(EngineError::NotRunning),
            RunState::Paused => return reject(EngineError::AlreadyPaused),
            RunState::Running => {}
        }
        if self.focus_locked() {
            return reject(EngineError::MaxFocusLocked("pause"));
        }

        self.disarm_countdown();
        self.run_state = RunState::Paused;
        tracing::debug!(remaining = self.remaining_seconds, "countdown paused");
        Ok(())
    }

    /// Restore the full duration of the current cycle and go idle
    pub fn reset(&mut self) {
        self.reset_countdown(self.cycle_type);
        tracing::debug!(cycle = %self.cycle_type, "countdown reset");
    }

    /// End the current cycle now, exactly as if the countdown had expired.
    ///
    /// Refused after a challenge completes until a new one is selected.
    pub fn skip(&mut self) -> Result<(), EngineError> {
        if self.challenge_completed {
            return reject(EngineError::NoChallengeSelected);
        }
        if self.focus_locked() {
            return reject(EngineError::MaxFocusLocked("skip"));
        }
        tracing::debug!(cycle = %self.cycle_type, remaining = self.remaining_seconds, "cycle skipped");
        self.remaining_seconds = 0;
        self.complete_cycle();
        Ok(())
    }

    /// Switch to `cycle_type` with a full countdown, idle
    pub fn set_cycle_type(&mut self, cycle_type: CycleType) {
        self.reset_countdown(cycle_type);
    }

    /// Select a challenge (or clear the selection with `None`).
    ///
    /// Always restarts at focus cycle 1. `total_cycles` becomes the
    /// challenge's planned cycles, or the configured default when nothing
    /// usable is selected.
    pub fn select_challenge(&mut self, id: Option<&str>) {
        self.current_cycle = 1;
        self.challenge_completed = false;
        self.selected = None;
        self.total_cycles = self.config.default_total_cycles;

        if let Some(id) = id {
            match self.repo.challenge(id) {
                Ok(Some(challenge)) if !challenge.completed => {
                    self.total_cycles = challenge.planned_cycles.max(1);
                    self.selected = Some(challenge);
                    self.announced_empty = false;
                }
                Ok(_) => {
                    tracing::warn!(challenge = id, "cannot select missing or completed challenge");
                    self.notices.push(Notice::ChallengeUnavailable { id: id.to_string() });
                }
                Err(err) => {
                    tracing::warn!(%err, challenge = id, "store unreachable; selection dropped");
                    self.notices.push(Notice::ChallengeUnavailable { id: id.to_string() });
                }
            }
        }

        let pointer = self.selected_id();
        if let Err(err) = self.repo.set_current_challenge_id(pointer.as_deref()) {
            tracing::warn!(%err, "could not persist selected challenge");
        }

        self.reset_countdown(CycleType::Focus);
        tracing::debug!(
            challenge = pointer.as_deref().unwrap_or("-"),
            total_cycles = self.total_cycles,
            "challenge selected"
        );
    }

    /// Hide the celebration overlay
    pub fn close_celebration(&mut self) {
        self.celebration_visible = false;
    }

    /// Turn the max focus lock on or off and persist it
    pub fn set_max_focus(&mut self, enabled: bool) {
        self.max_focus = enabled;
        if let Err(err) = self.repo.set_max_focus(enabled) {
            tracing::warn!(%err, "could not persist max focus flag");
        }
    }

    /// Deliver a timer firing. Ticks from cancelled timers are ignored.
    pub fn handle_timer(&mut self, id: TimerId) {
        if self.revalidation == Some(id) {
            self.revalidate();
            return;
        }
        if self.countdown != Some(id) || self.run_state != RunState::Running {
            tracing::trace!(timer = id.raw(), "ignoring stale tick");
            return;
        }

        if self.remaining_seconds <= 1 {
            self.remaining_seconds = 0;
            self.complete_cycle();
        } else {
            self.remaining_seconds -= 1;
        }
    }

    /// React to a storage-sync signal from another instance
    pub fn handle_storage_change(&mut self, key: &str) {
        match key {
            CHALLENGES_KEY => self.revalidate(),
            MAX_FOCUS_KEY => match self.repo.max_focus() {
                Ok(enabled) => self.max_focus = enabled,
                Err(err) => tracing::warn!(%err, "could not reload max focus flag"),
            },
            _ => {}
        }
    }

    /// Re-read the selected challenge and repair the selection if it was
    /// deleted or completed elsewhere.
    ///
    /// With nothing selected, the first pending challenge is picked
    /// automatically, except right after a completion, when the user
    /// chooses the next challenge.
    pub fn revalidate(&mut self) {
        let pending = match self.repo.pending_challenges() {
            Ok(pending) => pending,
            Err(err) => {
                tracing::warn!(%err, "store unreachable; skipping consistency check");
                return;
            }
        };

        if let Some(id) = self.selected_id() {
            match pending.into_iter().find(|c| c.id == id) {
                Some(fresh) => self.refresh_selection(fresh),
                None => self.heal_selection(&id),
            }
            return;
        }

        if let Some(first) = pending.first() {
            if !self.challenge_completed {
                let id = first.id.clone();
                self.select_challenge(Some(&id));
                if self.selected.is_some() {
                    tracing::info!(challenge = %id, "auto-selected pending challenge");
                    self.notices.push(Notice::AutoSelected { id });
                }
            }
        } else {
            self.announce_empty();
        }
    }

    /// Read-only view of the engine state
    #[must_use]
    pub fn snapshot(&self) -> CycleState {
        CycleState {
            remaining_seconds: self.remaining_seconds,
            cycle_type: self.cycle_type,
            run_state: self.run_state,
            current_cycle: self.current_cycle,
            total_cycles: self.total_cycles,
            selected_challenge_id: self.selected_id(),
            challenge_completed: self.challenge_completed,
            celebration_visible: self.celebration_visible,
            max_focus: self.max_focus,
        }
    }

    /// Drain pending UI notices, oldest first
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Full length of a cycle type under the current selection, in seconds
    #[must_use]
    pub fn duration_seconds(&self, cycle_type: CycleType) -> u64 {
        u64::from(self.minutes_for(cycle_type)) * 60
    }

    fn minutes_for(&self, cycle_type: CycleType) -> u32 {
        self.selected.as_ref().map_or_else(
            || self.config.minutes_for(cycle_type),
            |challenge| challenge.minutes_for(cycle_type),
        )
    }

    fn selected_id(&self) -> Option<String> {
        self.selected.as_ref().map(|c| c.id.clone())
    }

    const fn focus_locked(&self) -> bool {
        self.max_focus && matches!(self.cycle_type, CycleType::Focus)
    }

    fn arm_countdown(&mut self) {
        self.disarm_countdown();
        self.countdown = Some(self.clock.schedule_periodic(self.config.tick_interval()));
    }

    fn disarm_countdown(&mut self) {
        if let Some(id) = self.countdown.take() {
            self.clock.cancel(id);
        }
    }

    fn reset_countdown(&mut self, cycle_type: CycleType) {
        self.disarm_countdown();
        self.cycle_type = cycle_type;
        self.remaining_seconds = self.duration_seconds(cycle_type);
        self.run_state = RunState::Idle;
    }

    fn refresh_selection(&mut self, fresh: Challenge) {
        self.total_cycles = fresh.planned_cycles.max(1);
        self.current_cycle = self.current_cycle.min(self.total_cycles);
        self.selected = Some(fresh);
    }

    /// Drop a selection that no longer points at a pending challenge and
    /// fall back to the first pending one, if any.
    fn heal_selection(&mut self, id: &str) {
        tracing::warn!(challenge = id, "selected challenge missing or completed; clearing selection");
        self.notices.push(Notice::ChallengeUnavailable { id: id.to_string() });
        self.select_challenge(None);

        let next = match self.repo.pending_challenges() {
            Ok(pending) => pending.into_iter().next(),
            Err(err) => {
                tracing::warn!(%err, "store unreachable; no fallback challenge");
                None
            }
        };
        match next {
            Some(next) => {
                self.select_challenge(Some(&next.id));
                if self.selected.is_some() {
                    self.notices.push(Notice::AutoSelected { id: next.id });
                }
            }
            None => self.announce_empty(),
        }
    }

    fn announce_empty(&mut self) {
        if !self.announced_empty {
            self.announced_empty = true;
            self.notices.push(Notice::NoChallengeAvailable);
        }
    }

    fn notify(&self, message: &Message) {
        match self.repo.preferences() {
            Ok(preferences) if !preferences.notifications => return,
            Ok(_) => {}
            Err(err) => tracing::debug!(%err, "preferences unreadable; notifying anyway"),
        }
        if let Err(err) = self.notifier.notify(&message.title, &message.body) {
            tracing::debug!(%err, "notification dropped");
        }
    }

    /// Shared by natural expiry and skip
    fn complete_cycle(&mut self) {
        self.disarm_countdown();

        let finished = self.cycle_type;
        let minutes = self.minutes_for(finished);
        let now = self.clock.now();
        let next = if finished == CycleType::Focus {
            break_after_focus(self.current_cycle, self.config.long_break_every)
        } else {
            CycleType::Focus
        };
        let next_seconds = self.duration_seconds(next);

        self.notify(&Message::cycle_finished(finished, next));

        let session = Session::finished(finished, minutes, self.selected_id(), now);
        match self.repo.append_session(&session) {
            Ok(()) => self.bus.publish(Event::storage_sync(SESSIONS_KEY)),
            Err(err) => tracing::warn!(%err, "session not recorded"),
        }

        if finished == CycleType::Focus {
            if let Err(err) = self.repo.record_focus(minutes, now.date_naive()) {
                tracing::warn!(%err, "focus tally not updated");
            }
            if let Err(err) = self.repo.record_streak(now.date_naive()) {
                tracing::warn!(%err, "streak not updated");
            }
            if !self.credit_focus_cycle(now) {
                // Selection was healed onto another challenge, which starts at focus
                return;
            }
        } else {
            self.current_cycle = self
                .current_cycle
                .saturating_add(1)
                .min(self.total_cycles);
        }

        tracing::info!(
            finished = %finished,
            next = %next,
            cycle = self.current_cycle,
            total = self.total_cycles,
            "cycle complete"
        );
        self.reset_countdown(next);
        self.remaining_seconds = next_seconds;
    }

    /// Record a finished focus cycle against the selected challenge,
    /// completing it when the last planned cycle ends.
    ///
    /// Returns false if the challenge turned out to be gone or already
    /// completed and the selection was healed instead.
    fn credit_focus_cycle(&mut self, now: DateTime<Utc>) -> bool {
        let Some(challenge) = self.selected.clone() else {
            return true;
        };
        let cycle = self.current_cycle;
        let reached = cycle >= self.total_cycles;
        let today = now.date_naive();

        let mut already_completed = false;
        let written = self.repo.update_challenge(&challenge.id, |stored| {
            if stored.completed {
                already_completed = true;
                return;
            }
            if reached {
                stored.completed = true;
                stored.completed_cycles = stored.planned_cycles;
                stored.completed_date = Some(today);
            } else {
                stored.completed_cycles = cycle;
            }
        });

        let updated = match written {
            Ok(Some(_)) if already_completed => {
                self.heal_selection(&challenge.id);
                return false;
            }
            Ok(None) => {
                self.heal_selection(&challenge.id);
                return false;
            }
            Ok(Some(updated)) => {
                self.bus.publish(Event::storage_sync(CHALLENGES_KEY));
                updated
            }
            Err(err) => {
                tracing::warn!(%err, challenge = %challenge.id, "progress kept in memory only");
                let mut cached = challenge;
                if reached {
                    cached.completed = true;
                    cached.completed_cycles = cached.planned_cycles;
                    cached.completed_date = Some(today);
                } else {
                    cached.completed_cycles = cycle;
                }
                cached
            }
        };

        if reached {
            self.finish_challenge(&updated);
        } else {
            self.selected = Some(updated);
        }
        true
    }

    fn finish_challenge(&mut self, challenge: &Challenge) {
        self.challenge_completed = true;
        self.celebration_visible = true;
        self.selected = None;
        if let Err(err) = self.repo.set_current_challenge_id(None) {
            tracing::warn!(%err, "could not clear selected challenge");
        }

        self.bus.publish(Event::ChallengeChanged {
            kind: ChallengeChange::Completed,
            id: challenge.id.clone(),
        });
        self.bus.publish(Event::storage_sync(CHALLENGES_KEY));
        self.bus.publish(Event::storage_sync(CURRENT_CHALLENGE_KEY));

        self.notify(&Message::challenge_completed(&challenge.title));
        self.notices.push(Notice::ChallengeCompleted {
            id: challenge.id.clone(),
            title: challenge.title.clone(),
        });
        tracing::info!(challenge = %challenge.id, cycles = challenge.planned_cycles, "challenge completed");
    }
}

impl Drop for CycleEngine {
    fn drop(&mut self) {
        self.disarm_countdown();
        if let Some(id) = self.revalidation.take() {
            self.clock.cancel(id);
        }
    }
}

fn reject(err: EngineError) -> Result<(), EngineError> {
    tracing::warn!(%err, "command rejected");
    Err(err)
}
