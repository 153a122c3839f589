use std::fmt;

use tokio::io::AsyncWrite;

/// Destination for relayed output lines.
pub type Sink = Box<dyn AsyncWrite + Unpin + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run settings. The default relays nothing, evaluates both streams and
/// lets the child run to completion.
#[derive(Default)]
pub struct RunOptions {
    /// Kill the child on the first line that contains a trigger.
    pub abort: bool,
    pub stdout: Option<Sink>,
    pub stderr: Option<Sink>,
    /// Relay stdout but never evaluate it for triggers.
    pub ignore_stdout: bool,
    /// Relay stderr but never evaluate it for triggers.
    pub ignore_stderr: bool,
}

impl RunOptions {
    pub fn abort(mut self, abort: bool) -> Self {
        self.abort = abort;
        self
    }

    pub fn stdout_sink(mut self, sink: Sink) -> Self {
        self.stdout = Some(sink);
        self
    }

    pub fn stderr_sink(mut self, sink: Sink) -> Self {
        self.stderr = Some(sink);
        self
    }

    pub fn ignore_stdout(mut self, ignore: bool) -> Self {
        self.ignore_stdout = ignore;
        self
    }

    pub fn ignore_stderr(mut self, ignore: bool) -> Self {
        self.ignore_stderr = ignore;
        self
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("abort", &self.abort)
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .field("ignore_stdout", &self.ignore_stdout)
            .field("ignore_stderr", &self.ignore_stderr)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The child exited with status 0.
    Success,
    /// The child exited on its own with a non-zero code.
    ExitFailure(i32),
    /// The child was killed because a trigger matched in abort mode.
    Killed,
}

impl RunOutcome {
    pub fn exit_code(self) -> Option<i32> {
        match self {
            Self::Success => Some(0),
            Self::ExitFailure(code) => Some(code),
            Self::Killed => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Triggers in the order they were observed, one entry per matching line.
    pub found: Vec<String>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn triggered(&self) -> bool {
        !self.found.is_empty()
    }
}
