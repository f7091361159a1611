use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use sitewatch_config::{MonitorConfig, ResolvedPaths};
use sitewatch_detect::Detector;
use sitewatch_fetch::{EvidenceProvider, FetcherSet, ScreenshotCapture};
use sitewatch_notify::build_notifier;
use sitewatch_scheduler::{Scheduler, SchedulerOptions};
use sitewatch_store::TargetStore;

/// Configuration and resolved paths shared by every command.
pub(crate) struct AppContext {
    pub config: MonitorConfig,
    pub paths: ResolvedPaths,
    pub config_path: Option<PathBuf>,
}

impl AppContext {
    pub fn load(config_path: Option<&Path>, data_dir: Option<&Path>) -> Result<Self> {
        let config = MonitorConfig::load(config_path)?;
        let paths = config.storage.resolve(data_dir);
        Ok(Self {
            config,
            paths,
            config_path: config_path.map(Path::to_path_buf),
        })
    }

    pub fn store(&self) -> TargetStore {
        TargetStore::new(&self.paths.targets_file)
    }

    pub fn detector(&self) -> Detector {
        let evidence: Option<Arc<dyn EvidenceProvider>> = self.config.evidence.enabled.then(|| {
            Arc::new(ScreenshotCapture::from_config(
                &self.config,
                &self.paths.screenshots_dir,
            )) as Arc<dyn EvidenceProvider>
        });
        Detector::new(evidence)
    }

    /// Scheduler wired with the configured fetchers, evidence and notifier.
    pub fn scheduler(&self) -> Result<Scheduler> {
        Ok(Scheduler::new(
            self.store(),
            FetcherSet::from_config(&self.config)?,
            self.detector(),
            build_notifier(&self.config.notify)?,
            SchedulerOptions::from_config(&self.config.scheduler),
        ))
    }
}
