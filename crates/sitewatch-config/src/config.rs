//! Monitor configuration loaded from `~/.config/sitewatch/config.toml`.
//!
//! Every section is optional; a missing file yields the defaults. Notifier
//! credentials live here too, so the file is read once at startup and the
//! resulting notifier is injected into the scheduler.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths;

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
const DEFAULT_RENDERED_TIMEOUT_SECS: u64 = 20;
const DEFAULT_EVIDENCE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_EVIDENCE_SETTLE_MS: u64 = 3_000;
const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 15;
const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 30;
const REDACTED: &str = "[REDACTED]";

pub const DEFAULT_USER_AGENT: &str = concat!("sitewatch/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub evidence: EvidenceConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Where state lives. Relative paths resolve against `data_dir`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshots_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

/// Concrete filesystem locations after applying defaults and overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub data_dir: PathBuf,
    pub targets_file: PathBuf,
    pub screenshots_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl StorageConfig {
    /// Resolve all paths. `data_dir_override` (the `--data-dir` flag) beats the config file.
    pub fn resolve(&self, data_dir_override: Option<&Path>) -> ResolvedPaths {
        let data_dir = data_dir_override
            .map(Path::to_path_buf)
            .or_else(|| self.data_dir.clone())
            .unwrap_or_else(paths::state_dir);

        let pick = |configured: &Option<PathBuf>, default_name: &str| match configured {
            Some(path) => paths::resolve_under(&data_dir, path),
            None => data_dir.join(default_name),
        };

        ResolvedPaths {
            targets_file: pick(&self.targets_file, paths::TARGETS_FILE_NAME),
            screenshots_dir: pick(&self.screenshots_dir, paths::SCREENSHOTS_DIR_NAME),
            log_dir: pick(&self.log_dir, paths::LOGS_DIR_NAME),
            data_dir,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_rendered_timeout")]
    pub rendered_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            rendered_timeout_secs: DEFAULT_RENDERED_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Headless browser used for rendered fetches and screenshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Chromium/Chrome executable. None = search PATH.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
    /// Extra flags appended to every browser invocation (e.g. `--no-sandbox` in containers).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceConfig {
    /// Master switch; targets still opt in individually with `--evidence`.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_evidence_settle")]
    pub settle_ms: u64,
    #[serde(default = "default_evidence_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_window_size")]
    pub window_size: String,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settle_ms: DEFAULT_EVIDENCE_SETTLE_MS,
            timeout_secs: DEFAULT_EVIDENCE_TIMEOUT_SECS,
            window_size: default_window_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the target store is re-read to pick up new targets.
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: DEFAULT_RECONCILE_INTERVAL_SECS,
        }
    }
}

/// Notification transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotifyConfig {
    /// Write change events to the log only.
    #[default]
    Log,
    /// POST a JSON payload to an HTTP endpoint.
    Webhook {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bearer_token: Option<String>,
        #[serde(default = "default_notify_timeout")]
        timeout_secs: u64,
    },
    /// Pipe the message into a shell command (`{url}` and `{subject}` are substituted).
    Command {
        command: String,
        #[serde(default = "default_notify_timeout")]
        timeout_secs: u64,
    },
}

fn default_true() -> bool {
    true
}
fn default_fetch_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}
fn default_rendered_timeout() -> u64 {
    DEFAULT_RENDERED_TIMEOUT_SECS
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_evidence_settle() -> u64 {
    DEFAULT_EVIDENCE_SETTLE_MS
}
fn default_evidence_timeout() -> u64 {
    DEFAULT_EVIDENCE_TIMEOUT_SECS
}
fn default_window_size() -> String {
    "1280,2000".to_string()
}
fn default_reconcile_interval() -> u64 {
    DEFAULT_RECONCILE_INTERVAL_SECS
}
fn default_notify_timeout() -> u64 {
    DEFAULT_NOTIFY_TIMEOUT_SECS
}

impl MonitorConfig {
    /// Load config from an explicit path, or from the default location.
    ///
    /// An explicit path must exist. The default location falls back to
    /// `Default` when the file is absent or no config dir can be determined.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                path.to_path_buf()
            }
            None => match paths::default_config_path() {
                Some(path) if path.exists() => path,
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch.timeout_secs == 0 || self.fetch.rendered_timeout_secs == 0 {
            bail!("fetch timeouts must be greater than zero");
        }
        if self.scheduler.reconcile_interval_secs == 0 {
            bail!("scheduler.reconcile_interval_secs must be greater than zero");
        }
        if self.evidence.timeout_secs == 0 {
            bail!("evidence.timeout_secs must be greater than zero");
        }
        match &self.notify {
            NotifyConfig::Webhook { url, .. } if url.trim().is_empty() => {
                bail!("notify.url must not be empty for the webhook notifier")
            }
            NotifyConfig::Command { command, .. } if command.trim().is_empty() => {
                bail!("notify.command must not be empty for the command notifier")
            }
            NotifyConfig::Webhook { timeout_secs: 0, .. }
            | NotifyConfig::Command { timeout_secs: 0, .. } => {
                bail!("notify.timeout_secs must be greater than zero")
            }
            _ => Ok(()),
        }
    }

    /// Copy safe to print: secrets are replaced with a placeholder.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let NotifyConfig::Webhook {
            bearer_token: Some(token),
            ..
        } = &mut config.notify
        {
            *token = REDACTED.to_string();
        }
        config
    }

    /// Commented template written by `sitewatch config init`.
    pub fn default_template() -> String {
        r#"# sitewatch configuration
# Location: ~/.config/sitewatch/config.toml

[storage]
# data_dir = "/var/lib/sitewatch"     # default: XDG state dir
# targets_file = "targets.json"       # relative to data_dir
# screenshots_dir = "screenshots"
# log_dir = "logs"

[fetch]
timeout_secs = 15            # static HTTP fetch
rendered_timeout_secs = 20   # headless browser fetch
# user_agent = "sitewatch/0.1"

[browser]
# executable = "/usr/bin/chromium"
# extra_args = ["--no-sandbox"]

[evidence]
enabled = true       # targets opt in with `sitewatch add --evidence`
settle_ms = 3000
timeout_secs = 30
window_size = "1280,2000"

[scheduler]
reconcile_interval_secs = 15

[notify]
kind = "log"
#
# kind = "webhook"
# url = "https://hooks.example.com/sitewatch"
# bearer_token = "..."
# timeout_secs = 30
#
# kind = "command"
# command = "mail -s {subject} me@example.com"
# timeout_secs = 30
"#
        .to_string()
    }

    /// Write the default template to `path`, creating parent directories.
    /// Refuses to overwrite an existing file.
    pub fn save_default_template(path: &Path) -> Result<()> {
        if path.exists() {
            bail!("Config file already exists: {}", path.display());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir: {}", parent.display()))?;
        }
        std::fs::write(path, Self::default_template())
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}
