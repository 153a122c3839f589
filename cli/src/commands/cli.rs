use std::path::PathBuf;

use clap::Parser;

const EXAMPLE: &str = "EXAMPLE:\n  triggerfail --abort -v \"Error Warning\" mysqldump my_database > mysqlbackup.sql";

/// Fail a command with an exit status of 1 if a string appears in its output
/// (either stderr or stdout).
#[derive(Parser, Debug)]
#[command(
    name = "triggerfail",
    version,
    arg_required_else_help = true,
    after_help = EXAMPLE
)]
pub struct Args {
    /// Abort the running command as soon as a trigger is found. Without it the
    /// command is allowed to run to completion.
    #[arg(long)]
    pub abort: bool,

    /// Print every trigger that was found.
    #[arg(short, long)]
    pub verbose: bool,

    /// Don't evaluate stdout for triggers (it is still relayed).
    #[arg(long, conflicts_with = "ignore_stderr")]
    pub ignore_stdout: bool,

    /// Don't evaluate stderr for triggers (it is still relayed).
    #[arg(long)]
    pub ignore_stderr: bool,

    /// Discard the command's stdout instead of relaying it.
    #[arg(long)]
    pub no_stdout: bool,

    /// Discard the command's stderr instead of relaying it.
    #[arg(long)]
    pub no_stderr: bool,

    /// Read settings from this file instead of the default locations.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "triggerfail_core=trace". RUST_LOG wins.
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Space separated strings to match.
    #[arg(value_name = "TRIGGERS")]
    pub triggers: String,

    /// The command to run, followed by its arguments.
    #[arg(
        value_name = "COMMAND",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}
