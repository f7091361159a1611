//! Headless Chromium driver.
//!
//! Each operation launches a fresh browser process with a throwaway profile
//! directory, so concurrent targets never share browser state. The process is
//! placed in its own process group; on timeout the whole group is killed so no
//! renderer/GPU helpers are orphaned.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use sitewatch_config::BrowserConfig;
use tokio::process::Command;
use tracing::debug;

/// Executables searched for on PATH when none is configured.
const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

const STDERR_TAIL_CHARS: usize = 400;

#[derive(Debug)]
pub(crate) enum BrowserFailure {
    Timeout,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct Browser {
    executable: Option<PathBuf>,
    extra_args: Vec<String>,
    user_agent: String,
}

impl Browser {
    pub fn new(executable: Option<PathBuf>, extra_args: Vec<String>, user_agent: &str) -> Self {
        Self {
            executable,
            extra_args,
            user_agent: user_agent.to_string(),
        }
    }

    pub fn from_config(config: &BrowserConfig, user_agent: &str) -> Self {
        Self::new(config.executable.clone(), config.extra_args.clone(), user_agent)
    }

    /// The configured executable, or the first known browser found on PATH.
    ///
    /// Resolved lazily so that installations monitoring only static targets
    /// never need a browser.
    pub fn resolve_executable(&self) -> Result<PathBuf, String> {
        if let Some(executable) = &self.executable {
            return Ok(executable.clone());
        }
        BROWSER_CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| {
                format!(
                    "no Chromium/Chrome executable found on PATH (tried: {}); set browser.executable",
                    BROWSER_CANDIDATES.join(", ")
                )
            })
    }

    /// Render `url` and return the serialized DOM after `budget_ms` of virtual time.
    pub(crate) async fn dump_dom(
        &self,
        url: &str,
        budget_ms: u64,
        timeout: Duration,
    ) -> Result<String, BrowserFailure> {
        let profile = tempfile::tempdir()
            .map_err(|err| BrowserFailure::Failed(format!("failed to create profile dir: {err}")))?;
        let mut cmd = self.base_command(profile.path())?;
        cmd.arg(format!("--virtual-time-budget={budget_ms}"))
            .arg("--dump-dom")
            .arg(url);

        let output = self.run(cmd, timeout).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Render `url` and write a PNG screenshot to `output_path`.
    pub(crate) async fn screenshot(
        &self,
        url: &str,
        output_path: &Path,
        window_size: &str,
        budget_ms: u64,
        timeout: Duration,
    ) -> Result<(), BrowserFailure> {
        let profile = tempfile::tempdir()
            .map_err(|err| BrowserFailure::Failed(format!("failed to create profile dir: {err}")))?;
        let mut cmd = self.base_command(profile.path())?;
        cmd.arg(format!("--window-size={window_size}"))
            .arg(format!("--virtual-time-budget={budget_ms}"))
            .arg(format!("--screenshot={}", output_path.display()))
            .arg(url);

        self.run(cmd, timeout).await.map(|_| ())
    }

    fn base_command(&self, profile_dir: &Path) -> Result<Command, BrowserFailure> {
        let executable = self.resolve_executable().map_err(BrowserFailure::Failed)?;
        let mut cmd = Command::new(executable);
        cmd.arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--hide-scrollbars")
            .arg("--mute-audio")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg(format!("--user-data-dir={}", profile_dir.display()))
            .arg(format!("--user-agent={}", self.user_agent))
            .args(&self.extra_args);
        Ok(cmd)
    }

    async fn run(&self, mut cmd: Command, timeout: Duration) -> Result<Output, BrowserFailure> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let child = cmd
            .spawn()
            .map_err(|err| BrowserFailure::Failed(format!("failed to spawn browser: {err}")))?;
        let pid = child.id();

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => Ok(output),
            Ok(Ok(output)) => Err(BrowserFailure::Failed(format!(
                "browser exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            ))),
            Ok(Err(err)) => Err(BrowserFailure::Failed(format!(
                "failed to wait for browser: {err}"
            ))),
            Err(_) => {
                debug!(?pid, "Browser timed out, killing process group");
                kill_process_group(pid);
                Err(BrowserFailure::Timeout)
            }
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    let char_count = trimmed.chars().count();
    if char_count <= STDERR_TAIL_CHARS {
        return trimmed.to_string();
    }
    trimmed.chars().skip(char_count - STDERR_TAIL_CHARS).collect()
}

fn kill_process_group(pid: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pid) = pid {
            // SAFETY: kill() has no memory-safety preconditions. The negative PID
            // targets the process group created by process_group(0).
            unsafe {
                libc::kill(-(pid as i32), libc::SIGKILL);
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
    }
}
