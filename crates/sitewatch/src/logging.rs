//! Log setup for one-shot commands (stderr) and `run` (append-only file).

use std::path::Path;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

pub(crate) const MONITOR_LOG_FILE: &str = "monitor.log";

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Warnings and errors to stderr; `RUST_LOG` overrides.
pub(crate) fn init_stderr() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter("warn"))
        .try_init()
        .ok();
}

/// Create the writer for `{log_dir}/monitor.log`.
///
/// The returned guard flushes on drop and must outlive the subscriber.
pub(crate) fn create_monitor_log_writer(
    log_dir: &Path,
) -> Result<(
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
)> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log dir: {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::never(log_dir, MONITOR_LOG_FILE);
    Ok(tracing_appender::non_blocking(file_appender))
}

/// Route all `run` logging to the monitor log file.
pub(crate) fn init_monitor_log(
    log_dir: &Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let (writer, guard) = create_monitor_log_writer(log_dir)?;
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(env_filter("info"))
        .try_init()
        .ok();
    Ok(guard)
}
