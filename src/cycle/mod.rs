//! Cycle management
//!
//! This module holds the cycle types, timer configuration, the engine state
//! machine and its snapshot.

pub mod config;
pub mod engine;
pub mod kind;
pub mod state;
