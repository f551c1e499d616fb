//! Cronos - Pomodoro cycle engine
//!
//! Cronos drives focus and break cycles against user-defined challenges.
//! The engine persists challenges and a session log through a pluggable
//! key-value store and keeps multiple instances consistent through an
//! event bus plus a periodic self-healing check.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

pub mod challenge;
pub mod clock;
pub mod cycle;
pub mod driver;
pub mod error;
pub mod events;
pub mod logging;
pub mod notify;
pub mod session;
pub mod stats;
pub mod store;

#[cfg(test)]
mod testutil;

// Re-export commonly used types
pub use challenge::{Category, Challenge, ChallengeBook, NewChallenge, Priority};
pub use clock::{Clock, ManualClock, TimerId};
pub use cycle::config::TimerConfig;
pub use cycle::engine::{Collaborators, CycleEngine};
pub use cycle::kind::CycleType;
pub use cycle::state::{CycleState, Notice, RunState};
pub use driver::{EngineDriver, EngineHandle, TokioClock};
pub use error::EngineError;
pub use events::{ChallengeChange, Channel, Event, EventBus, LocalBus, NullBus};
pub use notify::{LogNotifier, Notifier, RecordingNotifier};
pub use session::Session;
pub use stats::Statistics;
pub use store::{FileStore, KeyValueStore, MemoryStore, Repository};
