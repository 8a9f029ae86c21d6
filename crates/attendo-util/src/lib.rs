//! Shared utilities for attendod
//!
//! This crate provides:
//! - ID types (InternId, RecordId, TaskId, ImageId, ClientId)
//! - Wall-clock helpers, daily time windows and the injectable `Clock`
//! - Rate limiting helpers
//! - Default paths for socket, config and data directories

mod ids;
mod paths;
mod rate_limit;
mod time;

pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
