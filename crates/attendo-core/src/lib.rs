//! Attendance lifecycle and time accounting for attendod
//!
//! This crate is the heart of attendod, containing:
//! - Time-window policy (when check-in/check-out is allowed)
//! - Record state machine (ongoing -> sent -> validated | flagged)
//! - Rendered-time accounting and intern status derivation
//! - The auto-timeout sweeper for abandoned records

pub mod accounting;
mod engine;
mod error;
mod events;
pub mod lifecycle;
mod notify;
mod policy;
mod sweeper;

#[cfg(test)]
mod testing;

pub use accounting::{Totals, derive_status};
pub use engine::*;
pub use error::*;
pub use events::*;
pub use lifecycle::{AUTO_TIMEOUT_REMARK, Transition};
pub use notify::*;
pub use policy::*;
pub use sweeper::*;
