//! Protocol and entity types for attendod
//!
//! This crate defines the stable API between attendod and its clients:
//! - Closed enumerations for record kinds, statuses and verdicts
//! - Entities (interns, attendance records, tasks, evidence images)
//! - Typed request structs per operation, with validation
//! - Responses and pushed events
//! - Versioning

mod commands;
mod events;
mod model;
mod types;
mod validate;

pub use commands::*;
pub use events::*;
pub use model::*;
pub use types::*;
pub use validate::*;

/// Current API version
pub const API_VERSION: u32 = 1;
