//! Foundational low-level utilities shared across cubewatch crates.
//!
//! Provides atomic file-write helpers and time utilities used by directory
//! snapshot persistence and refresh-cooldown calculations.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{cooldown_elapsed, current_unix_timestamp, current_unix_timestamp_ms};
