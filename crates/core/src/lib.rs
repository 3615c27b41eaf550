#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Shared models for the forge task-orchestration daemon: task records and
//! their state machine, validated request configurations, and API payloads.

pub mod api;
pub mod model;
pub mod outcome;
pub mod request;

mod util;

pub use util::{new_ulid, now_ms, EpochMs};
