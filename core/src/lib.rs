//! Supervise a child process, tee its stdout/stderr and report which trigger
//! strings showed up in its output.
pub mod config;
pub mod error;
pub mod runner;

pub use error::{RunFailure, RunnerError};
pub use runner::{
    run_command, RunOptions, RunOutcome, RunReport, Sink, StreamKind, TriggerSet,
};
