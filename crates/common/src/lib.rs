//! Shared types used across the simulator crates.
//!
//! Lengths are micrometres, volumes cubic micrometres, time seconds. No unit
//! conversion happens past this point; callers supply converted values.

mod types;
pub mod units;

pub use types::{ObjectId, Transform, WorldId};
