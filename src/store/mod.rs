//! Key-value persistence
//!
//! The engine persists everything as JSON strings under a handful of flat
//! keys. Any backend that can get/set/remove strings will do.

pub mod file;
pub mod memory;
pub mod repository;

use anyhow::Result;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use repository::{Backup, DailyTally, Preferences, Repository, Streak, TotalTally};

/// Challenge list
pub const CHALLENGES_KEY: &str = "cronos-challenges";
/// Append-only session log
pub const SESSIONS_KEY: &str = "cronos-sessions";
/// Id of the selected challenge
pub const CURRENT_CHALLENGE_KEY: &str = "cronos-current-challenge";
/// User preferences blob
pub const CONFIG_KEY: &str = "cronos-config";
/// Max focus lock flag
pub const MAX_FOCUS_KEY: &str = "cronos-max-focus";
/// Today's focus tally
pub const DAILY_STATS_KEY: &str = "cronos-stats-daily";
/// All-time focus tally
pub const TOTAL_STATS_KEY: &str = "cronos-stats-total";
/// Consecutive-day focus streak
pub const STREAK_KEY: &str = "cronos-streak";
/// Snapshot of the primary blobs, see [`Repository::backup`]
pub const BACKUP_KEY: &str = "cronos-backup";

/// Flat string blob store
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key was never set
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a key. No-op if it doesn't exist.
    fn remove(&self, key: &str) -> Result<()>;
}
