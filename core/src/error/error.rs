use thiserror::Error;

use crate::runner::StreamKind;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Runner(#[from] RunFailure),
    #[error("config error: {0}")]
    Config(String),
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("config error: {0}")]
    Config(String),
    #[error("spawn failed: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("no {0} pipe attached to child")]
    MissingPipe(StreamKind),
    #[error("stream io error: {stream} {source}")]
    StreamIo {
        stream: StreamKind,
        source: std::io::Error,
    },
    #[error("wait failed: {0}")]
    Wait(#[source] std::io::Error),
    #[error("command killed by signal: {signal}")]
    Signaled { signal: i32 },
}

impl RunnerError {
    /// True when the child never started, so no output was observed.
    pub fn is_start_failure(&self) -> bool {
        matches!(self, Self::Spawn(_) | Self::MissingPipe(_))
    }
}

/// A run that could not be classified as an exit of the child.
///
/// `found` holds whatever triggers were collected before the failure; it is
/// always empty when the child could not be spawned.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct RunFailure {
    pub found: Vec<String>,
    #[source]
    pub error: RunnerError,
}

impl RunFailure {
    pub fn new(found: Vec<String>, error: RunnerError) -> Self {
        Self { found, error }
    }
}

impl From<RunnerError> for RunFailure {
    fn from(error: RunnerError) -> Self {
        Self::new(Vec::new(), error)
    }
}
