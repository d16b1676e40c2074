//! Status-synchronization core for cubewatch.
//!
//! Drives the fetch -> probe -> aggregate -> render -> publish cycle that
//! keeps exactly one Discord message per channel in step with live
//! game-server state.

pub mod aggregate;
pub mod message_upsert;
pub mod prober;
pub mod render;
pub mod status_runtime;

pub use aggregate::ReportableEntry;
pub use message_upsert::{ChannelMessageState, PublishOutcome};
pub use status_runtime::{
    run_status_runtime, PollCycleReport, PollSource, PublishDisposition, StatusRuntime,
    StatusRuntimeConfig,
};
