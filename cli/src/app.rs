use std::process::Stdio;

use tokio::process::Command;
use triggerfail_core::config::RunConfig;
use triggerfail_core::error::CliError;
use triggerfail_core::{run_command, RunOptions, RunOutcome, RunReport, TriggerSet};

use crate::commands::cli::Args;

/// Flags after merging the command line over the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub abort: bool,
    pub verbose: bool,
    pub ignore_stdout: bool,
    pub ignore_stderr: bool,
}

impl Settings {
    pub fn resolve(args: &Args, cfg: &RunConfig) -> Result<Self, CliError> {
        let settings = Self {
            abort: args.abort || cfg.abort,
            verbose: args.verbose || cfg.verbose,
            ignore_stdout: args.ignore_stdout || cfg.ignore_stdout,
            ignore_stderr: args.ignore_stderr || cfg.ignore_stderr,
        };
        if settings.ignore_stdout && settings.ignore_stderr {
            return Err(CliError::Config(
                "ignoring both stdout and stderr leaves nothing to match".to_string(),
            ));
        }
        Ok(settings)
    }
}

pub async fn run_app(args: &Args, cfg: &RunConfig) -> Result<i32, CliError> {
    let settings = Settings::resolve(args, cfg)?;

    let triggers = TriggerSet::from_spaced(&args.triggers);
    if triggers.is_empty() {
        tracing::warn!("no triggers given, output will only be relayed");
    }

    let (program, rest) = args
        .command
        .split_first()
        .ok_or_else(|| CliError::Config("missing command".to_string()))?;
    let mut cmd = Command::new(program);
    cmd.args(rest).stdin(Stdio::inherit());

    let mut opts = RunOptions::default()
        .abort(settings.abort)
        .ignore_stdout(settings.ignore_stdout)
        .ignore_stderr(settings.ignore_stderr);
    if !args.no_stdout {
        opts = opts.stdout_sink(Box::new(tokio::io::stdout()));
    }
    if !args.no_stderr {
        opts = opts.stderr_sink(Box::new(tokio::io::stderr()));
    }

    tracing::debug!(?settings, program = %program, triggers = triggers.len(), "starting");

    match run_command(cmd, &triggers, opts).await {
        Ok(report) => {
            if settings.verbose {
                print_found(&report.found);
            }
            Ok(exit_code_for_report(&report))
        }
        Err(failure) => {
            if settings.verbose {
                print_found(&failure.found);
            }
            Err(failure.into())
        }
    }
}

fn print_found(found: &[String]) {
    for trigger in found {
        println!("Found trigger {trigger}");
    }
}

/// The child's own non-zero code wins; otherwise 1 if anything matched.
pub fn exit_code_for_report(report: &RunReport) -> i32 {
    match report.outcome {
        RunOutcome::ExitFailure(code) => code,
        _ if report.triggered() => 1,
        _ => 0,
    }
}
