//! Configuration for sitewatch (`~/.config/sitewatch/config.toml`).

pub mod config;
pub mod paths;

pub use config::{
    BrowserConfig, EvidenceConfig, FetchConfig, MonitorConfig, NotifyConfig, ResolvedPaths,
    SchedulerConfig, StorageConfig,
};
