//! Log output for embedders
//!
//! The library only emits `tracing` events; nothing is printed unless the
//! embedding program installs a subscriber, for example with [`init`].

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install a global fmt subscriber capped at `level`.
///
/// Fails if a global subscriber is already set.
pub fn init(level: Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")
}

/// Parse a level name such as `debug` or `WARN`, falling back to `info`
#[must_use]
pub fn level_from_name(name: &str) -> Level {
    name.parse().unwrap_or(Level::INFO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_name() {
        assert_eq!(level_from_name("debug"), Level::DEBUG);
        assert_eq!(level_from_name("WARN"), Level::WARN);
        assert_eq!(level_from_name("chatty"), Level::INFO);
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init(Level::DEBUG);
        assert!(init(Level::DEBUG).is_err());
    }
}
