//! Typed engine rejections
//!
//! Every variant is a recoverable, user-visible warning. The engine state is
//! unchanged whenever one of these is returned. `DriverStopped` is only
//! produced by the async handle.

use thiserror::Error;

/// Reasons the cycle engine refused a command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// `start` was called without a selected challenge
    #[error("no challenge selected: pick or create a challenge first")]
    NoChallengeSelected,

    /// The selected challenge was deleted or completed elsewhere
    #[error("challenge '{0}' was completed or removed")]
    ChallengeUnavailable(String),

    /// `start` while the countdown is already live
    #[error("timer already running")]
    AlreadyRunning,

    /// `pause` while nothing is counting down
    #[error("timer not running")]
    NotRunning,

    /// `pause` while already paused
    #[error("timer already paused")]
    AlreadyPaused,

    /// `pause` or `skip` attempted during a focus cycle with max focus on
    #[error("max focus mode is on: turn it off to {0} a focus cycle")]
    MaxFocusLocked(&'static str),

    /// The driver task behind an `EngineHandle` has exited
    #[error("engine driver stopped")]
    DriverStopped,
}
