//! Stream supervisor: spawns the child, runs one line scanner per output
//! stream, kills the child on the first trigger in abort mode and classifies
//! how the run ended.
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{RunFailure, RunnerError};

use super::abort::{KillLatch, KillRequest};
use super::found::FoundTriggers;
use super::scan::{self, ScanConfig};
use super::triggers::TriggerSet;
use super::types::{RunOptions, RunOutcome, RunReport, StreamKind};

/// Run `cmd` to completion (or until a trigger aborts it) and report which
/// triggers were seen.
///
/// The caller configures everything on `cmd` except stdout/stderr, which are
/// replaced by pipes owned by the scanners. Stdin is left as configured.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(program = %cmd.as_std().get_program().to_string_lossy(), abort = opts.abort)
)]
pub async fn run_command(
    mut cmd: Command,
    triggers: &TriggerSet,
    opts: RunOptions,
) -> Result<RunReport, RunFailure> {
    let RunOptions {
        abort,
        stdout: stdout_sink,
        stderr: stderr_sink,
        ignore_stdout,
        ignore_stderr,
    } = opts;

    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(RunnerError::Spawn)?;
    tracing::debug!(pid = ?child.id(), triggers = triggers.len(), "child spawned");

    let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
        (Some(out), Some(err)) => (out, err),
        (out, _) => {
            let missing = if out.is_none() {
                StreamKind::Stdout
            } else {
                StreamKind::Stderr
            };
            reap(&mut child).await;
            return Err(RunnerError::MissingPipe(missing).into());
        }
    };

    let triggers = Arc::new(triggers.clone());
    let found = FoundTriggers::new();
    let (latch, kill_rx) = KillLatch::new();
    let scan_cfg = |stream, evaluate| ScanConfig {
        stream,
        triggers: triggers.clone(),
        evaluate,
        abort,
        found: found.clone(),
        latch: latch.clone(),
    };

    let out_task = scan::spawn_scan(
        stdout,
        stdout_sink,
        scan_cfg(StreamKind::Stdout, !ignore_stdout),
    );
    let err_task = scan::spawn_scan(
        stderr,
        stderr_sink,
        scan_cfg(StreamKind::Stderr, !ignore_stderr),
    );

    let status = wait_or_kill(&mut child, kill_rx).await;

    let out_res = join_scan(out_task, StreamKind::Stdout).await;
    let err_res = join_scan(err_task, StreamKind::Stderr).await;
    let found = found.take();

    let status = match status {
        Ok(status) => status,
        Err(e) => return Err(RunFailure::new(found, RunnerError::Wait(e))),
    };
    // A dead stream can take the child down with SIGPIPE; report the stream.
    for res in [out_res, err_res] {
        if let Err(error) = res {
            tracing::warn!(error = %error, "stream scan failed");
            return Err(RunFailure::new(found, error));
        }
    }
    let outcome = match classify(status, latch.is_tripped()) {
        Ok(outcome) => outcome,
        Err(error) => return Err(RunFailure::new(found, error)),
    };

    tracing::debug!(?outcome, found = found.len(), "run finished");
    Ok(RunReport { found, outcome })
}

/// Wait for the child, issuing the kill if a scanner trips the latch first.
async fn wait_or_kill(
    child: &mut Child,
    mut kill_rx: oneshot::Receiver<KillRequest>,
) -> std::io::Result<ExitStatus> {
    let mut kill_pending = true;
    loop {
        tokio::select! {
            res = child.wait() => return res,
            req = &mut kill_rx, if kill_pending => {
                kill_pending = false;
                // Err: both scanners finished without aborting.
                let Ok(req) = req else { continue };
                match child.start_kill() {
                    Ok(()) => tracing::warn!(
                        pid = ?child.id(),
                        trigger = %req.trigger,
                        stream = %req.stream,
                        "trigger found, killing child"
                    ),
                    Err(e) => tracing::debug!(
                        error = %e,
                        trigger = %req.trigger,
                        "kill not delivered, child already exited"
                    ),
                }
            }
        }
    }
}

async fn join_scan(
    task: JoinHandle<Result<u64, RunnerError>>,
    stream: StreamKind,
) -> Result<u64, RunnerError> {
    match task.await {
        Ok(res) => res,
        Err(e) => Err(RunnerError::StreamIo {
            stream,
            source: std::io::Error::other(e.to_string()),
        }),
    }
}

async fn reap(child: &mut Child) {
    let _ = child.start_kill();
    let _ = child.wait().await;
}

/// `aborted` is the latch state: the run asked for the kill, whether the
/// signal landed or the child was already gone.
fn classify(status: ExitStatus, aborted: bool) -> Result<RunOutcome, RunnerError> {
    if aborted {
        return Ok(RunOutcome::Killed);
    }
    if status.success() {
        return Ok(RunOutcome::Success);
    }
    match status.code() {
        Some(code) => Ok(RunOutcome::ExitFailure(code)),
        None => Err(RunnerError::Signaled {
            signal: exit_signal(&status),
        }),
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> i32 {
    -1
}
