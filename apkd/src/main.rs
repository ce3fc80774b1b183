// apkd/src/main.rs
use std::fs;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use apkd_common::config::Config;
use apkd_common::error::Result;
use clap::Parser;
use colored::Colorize;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

mod bot;
mod cli;
mod context;
mod notify;
mod scheduler;

use cli::CliArgs;
use context::AppContext;

const NOTIFICATION_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Installs the subscriber. Logs also go to `<root>/logs/apkd.log` when
/// verbose or when running as a service.
fn init_logging(config: &Config, verbose: u8, to_file: bool) -> Option<WorkerGuard> {
    let level_filter = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let max_log_level = level_filter.into_level().unwrap_or(tracing::Level::INFO);

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("APKD_LOG")
        .from_env_lossy();

    let log_dir = config.logs_dir();
    if !(to_file || verbose > 0) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .without_time()
            .try_init();
        return None;
    }

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!(
            "{} Failed to create log directory {}: {} (logging to stderr only)",
            "Warning:".yellow().bold(),
            log_dir.display(),
            e
        );
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .without_time()
            .try_init();
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(&log_dir, "apkd.log");
    let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);
    let stderr_writer = std::io::stderr.with_max_level(max_log_level);
    let file_writer = non_blocking_appender.with_max_level(max_log_level);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(stderr_writer.and(file_writer))
        .with_ansi(true)
        .try_init();

    debug!("Writing logs to: {}/apkd.log", log_dir.display());
    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            process::exit(1);
        }
    };

    let _log_guard = init_logging(&config, cli_args.verbose, cli_args.command.is_service());

    let (ctx, forwarder) = AppContext::build(config)?;
    let command_result = cli_args.command.run(Arc::clone(&ctx)).await;

    // Last sender gone: the forwarder drains what is queued, then exits.
    drop(ctx);
    if tokio::time::timeout(NOTIFICATION_FLUSH_TIMEOUT, forwarder)
        .await
        .is_err()
    {
        warn!("Timed out delivering queued notifications");
    }

    if let Err(e) = command_result {
        error!("Command failed: {:#}", e);
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        process::exit(1);
    }

    debug!("Command completed successfully.");
    Ok(())
}
