#![forbid(unsafe_code)]

//! Process plumbing for the forge daemon: running the external generator,
//! building its command lines, and interpreting what it leaves behind.

pub mod command;
pub mod files;
pub mod output;
pub mod runner;

pub use command::{ForgeCommand, Toolchain};
pub use output::{ParseError, ParsedOutput};
pub use runner::{SubprocessResult, SubprocessRunner, INTERNAL_EXIT_CODE};
