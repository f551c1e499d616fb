//! Shared test utilities
//!
//! Common helpers used across test modules. Only compiled in test builds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{NaiveDate, TimeZone, Utc};

use crate::challenge::{Category, Challenge, Priority, FOCUS_MINUTES};
use crate::clock::ManualClock;
use crate::cycle::config::TimerConfig;
use crate::cycle::engine::{Collaborators, CycleEngine};
use crate::events::LocalBus;
use crate::notify::RecordingNotifier;
use crate::store::{KeyValueStore, MemoryStore, Repository};

/// Create a pending challenge with default 5/15 minute breaks.
///
/// The title is `Challenge <id>`.
#[must_use]
pub fn sample_challenge(id: &str, planned_cycles: u32) -> Challenge {
    Challenge {
        id: id.to_string(),
        title: format!("Challenge {id}"),
        description: None,
        category: Category::Other,
        priority: Priority::Medium,
        planned_cycles,
        completed_cycles: 0,
        completed: false,
        created_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        completed_date: None,
        focus_minutes: FOCUS_MINUTES,
        short_break_minutes: 5,
        long_break_minutes: 15,
    }
}

/// Store where every operation fails
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        bail!("store offline (get {key})")
    }

    fn set(&self, key: &str, _value: &str) -> Result<()> {
        bail!("store offline (set {key})")
    }

    fn remove(&self, key: &str) -> Result<()> {
        bail!("store offline (remove {key})")
    }
}

/// Memory store whose writes can be switched off
#[derive(Default)]
pub struct TestStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
}

impl TestStore {
    /// Make every later `set`/`remove` fail (or succeed again)
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl KeyValueStore for TestStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("disk full (set {key})");
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("disk full (remove {key})");
        }
        self.inner.remove(key)
    }
}

/// An engine wired to inspectable in-memory collaborators
pub struct Harness {
    pub store: Arc<TestStore>,
    pub bus: Arc<LocalBus>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    pub engine: CycleEngine,
}

impl Harness {
    /// Unmounted engine over a store holding `challenges`.
    ///
    /// The clock starts at 2025-06-02 09:00 UTC.
    pub fn new(challenges: &[Challenge]) -> Self {
        let store = Arc::new(TestStore::default());
        Repository::new(store.clone())
            .save_challenges(challenges)
            .unwrap();
        let bus = Arc::new(LocalBus::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap(),
        ));
        let engine = CycleEngine::new(
            TimerConfig::default(),
            Collaborators {
                store: store.clone(),
                bus: bus.clone(),
                notifier: notifier.clone(),
                clock: clock.clone(),
            },
        );
        Self {
            store,
            bus,
            notifier,
            clock,
            engine,
        }
    }

    /// Engine with `challenge` stored and selected
    pub fn selected(challenge: Challenge) -> Self {
        let id = challenge.id.clone();
        let mut harness = Self::new(&[challenge]);
        harness.engine.select_challenge(Some(&id));
        harness
    }

    /// Repository over the harness store
    pub fn repo(&self) -> Repository {
        Repository::new(self.store.clone())
    }

    /// A second engine sharing every collaborator, like another open window
    pub fn sibling(&self) -> CycleEngine {
        CycleEngine::new(
            TimerConfig::default(),
            Collaborators {
                store: self.store.clone(),
                bus: self.bus.clone(),
                notifier: self.notifier.clone(),
                clock: self.clock.clone(),
            },
        )
    }

    /// Advance the clock one second at a time, delivering every firing
    pub fn tick(&mut self, seconds: u64) {
        for _ in 0..seconds {
            for id in self.clock.advance(Duration::from_secs(1)) {
                self.engine.handle_timer(id);
            }
        }
    }

    /// Tick until the current countdown expires
    pub fn run_out(&mut self) {
        let remaining = self.engine.snapshot().remaining_seconds;
        self.tick(remaining);
    }
}
