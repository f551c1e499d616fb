//! Timer configuration parser
//!
//! Parses `cronos.toml` into cycle durations and engine cadence settings.
//! Every field is optional; omitted fields fall back to the classic
//! 25/5/15 pomodoro policy.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::cycle::kind::CycleType;

/// Engine-wide timer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TimerConfig {
    /// Focus cycle length in minutes (default: 25)
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u32,
    /// Short break length in minutes (default: 5)
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u32,
    /// Long break length in minutes (default: 15)
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,
    /// Cycle count used when no challenge is selected (default: 4)
    #[serde(default = "default_total_cycles")]
    pub default_total_cycles: u32,
    /// Every Nth completed focus cycle is followed by a long break (default: 4)
    #[serde(default = "default_long_break_every")]
    pub long_break_every: u32,
    /// Seconds between consistency re-checks of the selected challenge (default: 30)
    #[serde(default = "default_revalidate_interval_secs")]
    pub revalidate_interval_secs: u64,
    /// Countdown tick period in milliseconds (default: 1000)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

const fn default_focus_minutes() -> u32 {
    25
}

const fn default_short_break_minutes() -> u32 {
    5
}

const fn default_long_break_minutes() -> u32 {
    15
}

const fn default_total_cycles() -> u32 {
    4
}

const fn default_long_break_every() -> u32 {
    4
}

const fn default_revalidate_interval_secs() -> u64 {
    30
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            default_total_cycles: default_total_cycles(),
            long_break_every: default_long_break_every(),
            revalidate_interval_secs: default_revalidate_interval_secs(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl TimerConfig {
    /// Parse a cronos.toml file from a path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse cronos.toml content from a string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse cronos.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Configured length of a cycle type, in minutes
    #[must_use]
    pub const fn minutes_for(&self, cycle: CycleType) -> u32 {
        match cycle {
            CycleType::Focus => self.focus_minutes,
            CycleType::ShortBreak => self.short_break_minutes,
            CycleType::LongBreak => self.long_break_minutes,
        }
    }

    /// Countdown tick period
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Period of the consistency re-check
    #[must_use]
    pub const fn revalidate_interval(&self) -> Duration {
        Duration::from_secs(self.revalidate_interval_secs)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        for (name, minutes) in [
            ("focus_minutes", self.focus_minutes),
            ("short_break_minutes", self.short_break_minutes),
            ("long_break_minutes", self.long_break_minutes),
        ] {
            if minutes == 0 {
                bail!("{name} must be at least 1 minute");
            }
        }

        if self.default_total_cycles == 0 {
            bail!("default_total_cycles must be at least 1");
        }

        if self.long_break_every == 0 {
            bail!("long_break_every must be at least 1");
        }

        if self.revalidate_interval_secs == 0 {
            bail!("revalidate_interval_secs must be at least 1");
        }

        if self.tick_interval_ms == 0 {
            bail!("tick_interval_ms must be at least 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TimerConfig::parse("").unwrap();
        assert_eq!(config, TimerConfig::default());
        assert_eq!(config.focus_minutes, 25);
        assert_eq!(config.short_break_minutes, 5);
        assert_eq!(config.long_break_minutes, 15);
        assert_eq!(config.default_total_cycles, 4);
        assert_eq!(config.long_break_every, 4);
    }

    #[test]
    fn test_parse_overrides() {
        let toml = r"
focus_minutes = 50
short_break_minutes = 10
long_break_every = 2
revalidate_interval_secs = 5
";
        let config = TimerConfig::parse(toml).unwrap();
        assert_eq!(config.focus_minutes, 50);
        assert_eq!(config.short_break_minutes, 10);
        assert_eq!(config.long_break_minutes, 15);
        assert_eq!(config.long_break_every, 2);
        assert_eq!(config.revalidate_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_minutes_for_each_cycle() {
        let config = TimerConfig::default();
        assert_eq!(config.minutes_for(CycleType::Focus), 25);
        assert_eq!(config.minutes_for(CycleType::ShortBreak), 5);
        assert_eq!(config.minutes_for(CycleType::LongBreak), 15);
    }

    #[test]
    fn test_reject_zero_duration() {
        let err = TimerConfig::parse("short_break_minutes = 0").unwrap_err();
        assert!(
            err.to_string().contains("short_break_minutes"),
            "Expected field name in error, got: {err}"
        );
    }

    #[test]
    fn test_reject_zero_long_break_cadence() {
        let err = TimerConfig::parse("long_break_every = 0").unwrap_err();
        assert!(err.to_string().contains("long_break_every"));
    }

    #[test]
    fn test_reject_unknown_field() {
        let result = TimerConfig::parse("focus_mins = 20");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cronos.toml");
        std::fs::write(&path, "tick_interval_ms = 250\n").unwrap();

        let config = TimerConfig::from_path(&path).unwrap();
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = TimerConfig::from_path("/nonexistent/cronos.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
