use std::path::PathBuf;

use clap::Parser;
mod app;
mod commands;
use commands::cli;
use triggerfail_core::config::{self, AppConfig, LoggingConfig};
use triggerfail_core::error::{self, RunnerError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "triggerfail failed");
            eprintln!("triggerfail: {e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, error::CliError> {
    let args = cli::Args::parse();
    let mut cfg = load_config(&args)?;
    if let Some(level) = args.log_level.as_deref() {
        cfg.logging.level = level.to_string();
    }
    init_tracing(&cfg.logging).map_err(error::CliError::Config)?;

    app::run_app(&args, &cfg.run).await
}

fn load_config(args: &cli::Args) -> Result<AppConfig, error::CliError> {
    let loaded = match args.config.as_deref() {
        Some(path) => config::load_from_path(path),
        None => config::load_default(),
    };
    loaded.map_err(|e| error::CliError::Config(e.to_string()))
}

fn exit_code_for_error(e: &error::CliError) -> i32 {
    // 0/1: nothing / something matched (see app::exit_code_for_report)
    // 1: runner start / IO error
    // 2: config error
    // 128+n: child killed by a signal we did not send
    match e {
        error::CliError::Config(_) => 2,
        error::CliError::Runner(failure) => match failure.error {
            RunnerError::Config(_) => 2,
            RunnerError::Signaled { signal } if signal > 0 => 128 + signal,
            _ => 1,
        },
    }
}

/// RUST_LOG wins over the configured level.
fn log_filter(logging: &LoggingConfig) -> Result<EnvFilter, String> {
    match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => Ok(EnvFilter::new(v)),
        _ => EnvFilter::try_new(&logging.level).map_err(|e| format!("bad log level: {e}")),
    }
}

fn log_dir(logging: &LoggingConfig) -> PathBuf {
    logging
        .directory
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("triggerfail"))
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }
    if !logging.console && !logging.file {
        return Err("logging disabled for both console and file".to_string());
    }

    let filter = log_filter(logging)?;

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = if logging.file {
        let dir = log_dir(logging);
        std::fs::create_dir_all(&dir)
            .map_err(|e| format!("create log dir {} failed: {e}", dir.display()))?;
        let appender = tracing_appender::rolling::never(
            dir,
            format!("triggerfail.{}.log", std::process::id()),
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| e.to_string())
}
