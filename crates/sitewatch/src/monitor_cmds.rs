use anyhow::{Context, Result};
use serde::Serialize;
use sitewatch_detect::CheckOutcome;
use sitewatch_scheduler::CheckReport;
use tracing::info;

use crate::cli::OutputFormat;
use crate::context::AppContext;
use crate::logging;

/// Monitor until SIGINT/SIGTERM, then drain in-flight checks and save.
pub(crate) async fn handle_run(ctx: &AppContext) -> Result<()> {
    let _log_guard = logging::init_monitor_log(&ctx.paths.log_dir)?;
    let scheduler = ctx.scheduler()?;

    let started = scheduler.start().await?;
    eprintln!(
        "Monitoring {started} target(s) from {}; log: {}",
        ctx.paths.targets_file.display(),
        ctx.paths.log_dir.join(logging::MONITOR_LOG_FILE).display()
    );

    wait_for_shutdown_signal().await?;
    info!("Shutdown requested");
    eprintln!("Stopping, waiting for in-flight checks...");
    scheduler.shutdown().await
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("Failed to listen for Ctrl-C")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")
}

#[derive(Serialize)]
struct CheckLine<'a> {
    url: &'a str,
    selector: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    diff: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> From<&'a CheckReport> for CheckLine<'a> {
    fn from(report: &'a CheckReport) -> Self {
        let (status, diff, error) = match &report.result {
            Ok(outcome) => {
                let diff = match outcome {
                    CheckOutcome::Changed(event) => Some(event.diff.as_str()),
                    _ => None,
                };
                (outcome.label(), diff, None)
            }
            Err(err) => ("ERROR", None, Some(err.to_string())),
        };
        Self {
            url: &report.key.url,
            selector: &report.key.selector,
            status,
            diff,
            error,
        }
    }
}

/// One pass over all targets. Fetch failures are reported per target, not as
/// a command failure.
pub(crate) async fn handle_check(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let reports = ctx.scheduler()?.check_all().await?;
    let lines: Vec<CheckLine<'_>> = reports.iter().map(CheckLine::from).collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&lines)?),
        OutputFormat::Text => {
            if lines.is_empty() {
                eprintln!("No targets to check.");
            }
            for line in &lines {
                println!("{}", format_check_line(line));
            }
        }
    }
    Ok(())
}

fn format_check_line(line: &CheckLine<'_>) -> String {
    let mut out = format!("{:<9}  {} ({})", line.status, line.url, line.selector);
    if let Some(diff) = line.diff {
        out.push_str(&format!(": {diff}"));
    }
    if let Some(error) = &line.error {
        out.push_str(&format!(": {error}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitewatch_core::{FetchError, TargetKey};
    use sitewatch_detect::ChangeEvent;

    fn report(result: Result<CheckOutcome, FetchError>) -> CheckReport {
        CheckReport {
            key: TargetKey::new("https://shop.example", "#price"),
            result,
        }
    }

    #[test]
    fn test_check_lines() {
        let changed = report(Ok(CheckOutcome::Changed(ChangeEvent {
            old_text: "Price: 10".into(),
            new_text: "Price: 12".into(),
            diff: "Price: 1[-0-]{+2+}".into(),
        })));
        assert_eq!(
            format_check_line(&CheckLine::from(&changed)),
            "CHANGED    https://shop.example (#price): Price: 1[-0-]{+2+}"
        );

        let unchanged = report(Ok(CheckOutcome::Unchanged));
        assert_eq!(
            format_check_line(&CheckLine::from(&unchanged)),
            "NO CHANGE  https://shop.example (#price)"
        );

        let baseline = report(Ok(CheckOutcome::Baseline));
        assert_eq!(
            format_check_line(&CheckLine::from(&baseline)),
            "BASELINE   https://shop.example (#price)"
        );

        let failed = report(Err(FetchError::Status {
            url: "https://shop.example".into(),
            status: 503,
        }));
        assert_eq!(
            format_check_line(&CheckLine::from(&failed)),
            "ERROR      https://shop.example (#price): Request to https://shop.example returned HTTP 503"
        );
    }

    #[test]
    fn test_check_line_json() {
        let failed = report(Err(FetchError::Timeout {
            url: "https://shop.example".into(),
            secs: 15,
        }));
        let json = serde_json::to_value(CheckLine::from(&failed)).unwrap();
        assert_eq!(json["status"], "ERROR");
        assert!(json.get("diff").is_none());
        assert_eq!(json["error"], "Request to https://shop.example timed out after 15s");
    }
}
