use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sitewatch_config::SchedulerConfig;
use sitewatch_core::{FetchError, MonitorTarget, TargetKey};
use sitewatch_detect::{CheckOutcome, Detector};
use sitewatch_fetch::FetcherSet;
use sitewatch_notify::{Notifier, format_message};
use sitewatch_store::TargetStore;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::registry::{Registry, TargetState};
use crate::task;

const DEFAULT_FREQUENCY_UNIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub reconcile_interval: Duration,
    /// Length of one "minute" of `frequency_minutes`. Shortened in tests.
    pub frequency_unit: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

impl SchedulerOptions {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            reconcile_interval: Duration::from_secs(config.reconcile_interval_secs),
            frequency_unit: DEFAULT_FREQUENCY_UNIT,
        }
    }

    fn period(&self, frequency_minutes: u32) -> Duration {
        self.frequency_unit * frequency_minutes.max(1)
    }
}

/// Result of one check made by [`Scheduler::check_all`].
#[derive(Debug)]
pub struct CheckReport {
    pub key: TargetKey,
    pub result: Result<CheckOutcome, FetchError>,
}

pub(crate) struct Shared {
    store: TargetStore,
    registry: Mutex<Registry>,
    /// Serializes saves so an older snapshot never lands after a newer one.
    save_lock: Mutex<()>,
    fetchers: FetcherSet,
    detector: Detector,
    notifier: Arc<dyn Notifier>,
    options: SchedulerOptions,
    pub(crate) cancel: CancellationToken,
}

impl Shared {
    /// Run one fetch/detect/notify cycle for `key`. `None` if the key is unknown.
    pub(crate) async fn check_once(
        &self,
        key: &TargetKey,
    ) -> Option<Result<CheckOutcome, FetchError>> {
        // Work on a copy so the registry lock is not held across network I/O.
        let mut target = self.registry.lock().await.target(key).cloned()?;
        let result = self.detector.check_target(&mut target, &self.fetchers).await;

        match &result {
            Ok(outcome) => {
                if outcome.is_recorded() {
                    self.registry.lock().await.update(target.clone());
                }
                if let CheckOutcome::Changed(event) = outcome {
                    let message =
                        format_message(&target.url, &event.old_text, &event.new_text, &event.diff);
                    if let Err(err) = self.notifier.notify(&target.url, &message).await {
                        warn!(target = %key, error = %err, "Notification failed");
                    }
                }
            }
            Err(err) => warn!(target = %key, error = %err, "Check failed"),
        }
        Some(result)
    }

    /// Write unsaved state to the store, keeping targets that exist only on disk.
    ///
    /// On failure the registry stays dirty, so the next call writes again.
    pub(crate) async fn persist(&self) -> Result<()> {
        let _saving = self.save_lock.lock().await;
        let targets = {
            let mut registry = self.registry.lock().await;
            if !registry.dirty {
                return Ok(());
            }
            registry.dirty = false;
            registry.targets()
        };

        // The store takes a blocking file lock that a concurrent `add` may hold.
        let store = self.store.clone();
        let count = targets.len();
        let saved = tokio::task::spawn_blocking(move || store.merge_save(&targets))
            .await
            .context("Target save task join error")
            .and_then(|result| result.context("Failed to save targets"));
        if let Err(err) = saved {
            self.registry.lock().await.dirty = true;
            return Err(err);
        }
        debug!(targets = count, "Targets persisted");
        Ok(())
    }

    async fn load_store(&self) -> Result<Vec<MonitorTarget>> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || {
            store.load().with_context(|| {
                format!("Failed to load targets from {}", store.path().display())
            })
        })
        .await
        .context("Target load task join error")?
    }
}

/// Owns every running target task. Cheap to clone.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    pub fn new(
        store: TargetStore,
        fetchers: FetcherSet,
        detector: Detector,
        notifier: Arc<dyn Notifier>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                registry: Mutex::new(Registry::default()),
                save_lock: Mutex::new(()),
                fetchers,
                detector,
                notifier,
                options,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Load the store, start a task per target, and begin periodic reconciliation.
    ///
    /// Fails only if the store cannot be read. Returns the number of tasks started.
    pub async fn start(&self) -> Result<usize> {
        let targets = self.shared.load_store().await?;
        let mut started = 0;
        for target in targets {
            if self.register(target).await {
                started += 1;
            }
        }

        let reconciler = tokio::spawn(task::run_reconciler(
            self.clone(),
            self.shared.options.reconcile_interval,
            self.shared.cancel.clone(),
        ));
        self.shared.registry.lock().await.reconciler = Some(reconciler);

        info!(targets = started, "Scheduler started");
        Ok(started)
    }

    /// Start monitoring `target` unless its key is already registered.
    pub async fn register(&self, target: MonitorTarget) -> bool {
        let key = target.key();
        let mut registry = self.shared.registry.lock().await;
        if registry.contains(&key) {
            return false;
        }
        if self.shared.cancel.is_cancelled() {
            debug!(target = %key, "Scheduler is shutting down, not registering");
            return false;
        }

        let period = self.shared.options.period(target.frequency_minutes);
        registry.insert(target);
        let handle = tokio::spawn(task::run_target(
            Arc::clone(&self.shared),
            key.clone(),
            period,
        ));
        registry.attach(&key, handle);
        info!(target = %key, every = ?period, "Monitoring started");
        true
    }

    /// Start tasks for targets added to the store since the last look.
    pub async fn reconcile(&self) -> usize {
        let targets = match self.shared.load_store().await {
            Ok(targets) => targets,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "Reconcile could not read the target store");
                return 0;
            }
        };
        let mut started = 0;
        for target in targets {
            if self.register(target).await {
                started += 1;
            }
        }
        if started > 0 {
            info!(started, "Picked up new targets");
        }
        started
    }

    pub async fn state(&self, key: &TargetKey) -> TargetState {
        self.shared.registry.lock().await.state(key)
    }

    pub async fn snapshot(&self) -> Vec<MonitorTarget> {
        self.shared.registry.lock().await.targets()
    }

    /// Stop every task, wait for in-flight checks, then save what they recorded.
    pub async fn shutdown(&self) -> Result<()> {
        self.shared.cancel.cancel();
        let handles = self.shared.registry.lock().await.take_handles();
        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "Target task ended abnormally");
            }
        }
        self.shared
            .persist()
            .await
            .context("Failed to save targets on shutdown")?;
        info!("Scheduler stopped");
        Ok(())
    }

    /// Check every stored target once, concurrently, and save the results.
    ///
    /// Reports come back in store order.
    pub async fn check_all(&self) -> Result<Vec<CheckReport>> {
        let targets = self.shared.load_store().await?;
        let keys: Vec<TargetKey> = {
            let mut registry = self.shared.registry.lock().await;
            targets
                .into_iter()
                .map(|target| {
                    let key = target.key();
                    if !registry.contains(&key) {
                        registry.insert(target);
                    }
                    key
                })
                .collect()
        };

        let mut join_set = JoinSet::new();
        for (index, key) in keys.into_iter().enumerate() {
            let shared = Arc::clone(&self.shared);
            join_set.spawn(async move {
                let result = shared.check_once(&key).await;
                (index, key, result)
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, key, Some(result))) => reports.push((index, CheckReport { key, result })),
                Ok((_, key, None)) => debug!(target = %key, "Target vanished before check"),
                Err(err) => error!(error = %err, "Check task join error"),
            }
        }
        reports.sort_by_key(|(index, _)| *index);

        self.shared
            .persist()
            .await
            .context("Failed to save check results")?;
        Ok(reports.into_iter().map(|(_, report)| report).collect())
    }
}
