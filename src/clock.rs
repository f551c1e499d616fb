//! Time source and periodic timers
//!
//! A [`Clock`] hands out [`TimerId`]s for periodic timers; whoever owns the
//! engine delivers each firing back through `CycleEngine::handle_timer`.
//! Ids are never reused, so a firing that races a cancellation can be
//! recognised as stale and dropped.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Identifies one scheduled periodic timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    /// Wrap a raw id. Clock implementations must never hand out the same value twice.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Clock collaborator
pub trait Clock: Send + Sync {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;

    /// Start a timer that fires every `interval` until cancelled
    fn schedule_periodic(&self, interval: Duration) -> TimerId;

    /// Stop a timer. Unknown or already cancelled ids are ignored.
    fn cancel(&self, id: TimerId);
}

#[derive(Debug)]
struct ScheduledTimer {
    interval: Duration,
    next_due: Duration,
}

#[derive(Debug)]
struct ManualState {
    now: DateTime<Utc>,
    elapsed: Duration,
    next_id: u64,
    timers: BTreeMap<TimerId, ScheduledTimer>,
}

/// Clock that only moves when told to.
///
/// [`ManualClock::advance`] returns the firings that fell inside the
/// advanced window, in chronological order, for the caller to deliver.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

impl ManualClock {
    /// Start the clock at `start`
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: start,
                elapsed: Duration::ZERO,
                next_id: 0,
                timers: BTreeMap::new(),
            }),
        }
    }

    /// Move time forward and collect due firings
    pub fn advance(&self, by: Duration) -> Vec<TimerId> {
        let Ok(mut state) = self.state.lock() else {
            return Vec::new();
        };
        let target = state.elapsed + by;
        let mut fired = Vec::new();

        loop {
            let due = state
                .timers
                .iter()
                .filter(|(_, timer)| timer.next_due <= target)
                .min_by_key(|(id, timer)| (timer.next_due, **id))
                .map(|(id, _)| *id);
            let Some(id) = due else { break };
            if let Some(timer) = state.timers.get_mut(&id) {
                timer.next_due += timer.interval;
            }
            fired.push(id);
        }

        state.elapsed = target;
        state.now += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        fired
    }

    /// Returns true while the timer is scheduled
    #[must_use]
    pub fn is_active(&self, id: TimerId) -> bool {
        self.state
            .lock()
            .is_ok_and(|state| state.timers.contains_key(&id))
    }

    /// Number of scheduled timers
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.state.lock().map_or(0, |state| state.timers.len())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.state.lock().map_or_else(|_| Utc::now(), |state| state.now)
    }

    fn schedule_periodic(&self, interval: Duration) -> TimerId {
        let Ok(mut state) = self.state.lock() else {
            return TimerId(u64::MAX);
        };
        state.next_id += 1;
        let id = TimerId(state.next_id);
        let interval = interval.max(Duration::from_millis(1));
        let next_due = state.elapsed + interval;
        state.timers.insert(id, ScheduledTimer { interval, next_due });
        id
    }

    fn cancel(&self, id: TimerId) {
        if let Ok(mut state) = self.state.lock() {
            state.timers.remove(&id);
        }
    }
}
