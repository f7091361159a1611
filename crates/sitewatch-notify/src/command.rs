//! Notification through an external command such as `sendmail -t`.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use sitewatch_core::NotifyError;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::{Notifier, SUBJECT};

/// Runs `sh -c <template>` with `{url}` and `{subject}` substituted and the
/// message written to stdin.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    template: String,
    timeout: Duration,
}

impl CommandNotifier {
    pub fn new(template: impl Into<String>, timeout: Duration) -> Self {
        Self {
            template: template.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn notify(&self, url: &str, message: &str) -> Result<(), NotifyError> {
        let expanded = substitute_variables(&self.template, &[("url", url), ("subject", SUBJECT)]);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&expanded)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // New process group so a timeout also takes down the shell's children.
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let mut child = cmd
            .spawn()
            .map_err(|err| NotifyError::Transport(format!("failed to spawn notify command: {err}")))?;
        let pid = child.id();
        let stdin = child.stdin.take();
        let body = message.as_bytes().to_vec();

        let run = async move {
            if let Some(mut stdin) = stdin {
                // A command that ignores stdin may exit before reading it.
                if let Err(err) = stdin.write_all(&body).await {
                    debug!(error = %err, "Notify command did not consume stdin");
                }
            }
            child.wait_with_output().await
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) if output.status.success() => {
                debug!(url, "Notify command completed");
                Ok(())
            }
            Ok(Ok(output)) => Err(NotifyError::Transport(format!(
                "notify command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
            Ok(Err(err)) => Err(NotifyError::Transport(format!(
                "failed to wait for notify command: {err}"
            ))),
            Err(_) => {
                kill_process_group(pid);
                Err(NotifyError::Timeout(self.timeout.as_secs()))
            }
        }
    }
}

/// Wrap in single quotes; embedded quotes become `'\''`.
fn shell_escape(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Single pass over `template`: `{key}` is replaced by the shell-escaped value,
/// unknown or unclosed placeholders are kept verbatim.
fn substitute_variables(template: &str, variables: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.chars();

    while let Some(ch) = chars.next() {
        if ch != '{' {
            result.push(ch);
            continue;
        }
        let mut key = String::new();
        let mut closed = false;
        for inner in chars.by_ref() {
            if inner == '}' {
                closed = true;
                break;
            }
            key.push(inner);
        }
        let value = variables
            .iter()
            .find(|(name, _)| closed && *name == key)
            .map(|(_, value)| *value);
        match value {
            Some(value) => result.push_str(&shell_escape(value)),
            None => {
                result.push('{');
                result.push_str(&key);
                if closed {
                    result.push('}');
                }
            }
        }
    }
    result
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
