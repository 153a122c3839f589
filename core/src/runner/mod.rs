mod abort;
mod found;
mod run;
mod scan;
mod triggers;
pub mod types;

pub use run::run_command;
pub use triggers::TriggerSet;
pub use types::{RunOptions, RunOutcome, RunReport, Sink, StreamKind};
