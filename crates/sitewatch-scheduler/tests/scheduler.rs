use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sitewatch_core::{FetchError, MonitorTarget, NotifyError, TargetKey};
use sitewatch_detect::{CheckOutcome, Detector};
use sitewatch_fetch::{Fetcher, FetcherSet};
use sitewatch_notify::Notifier;
use sitewatch_scheduler::{Scheduler, SchedulerOptions, TargetState};
use sitewatch_store::{NewTarget, TargetStore};
use tempfile::TempDir;

/// Serves a scripted sequence of texts per URL; the last entry repeats.
/// Calls listed in `failures` return a network error instead.
#[derive(Default)]
struct ScriptedFetcher {
    scripts: HashMap<String, Vec<String>>,
    delays: HashMap<String, Duration>,
    failures: HashMap<String, Vec<usize>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedFetcher {
    fn script(mut self, url: &str, texts: &[&str]) -> Self {
        self.scripts
            .insert(url.to_string(), texts.iter().map(|t| t.to_string()).collect());
        self
    }

    fn delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    fn fail_on(mut self, url: &str, call: usize) -> Self {
        self.failures.entry(url.to_string()).or_default().push(call);
        self
    }

    fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, selector: &str) -> Result<String, FetchError> {
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(url.to_string()).or_default();
            *count += 1;
            *count - 1
        };
        if self
            .failures
            .get(url)
            .is_some_and(|calls| calls.contains(&call))
        {
            return Err(FetchError::Network {
                url: url.to_string(),
                message: "connection reset".to_string(),
            });
        }
        let script = self
            .scripts
            .get(url)
            .ok_or_else(|| FetchError::SelectorNotFound {
                url: url.to_string(),
                selector: selector.to_string(),
            })?;
        Ok(script[call.min(script.len() - 1)].clone())
    }
}

/// Records every attempt. A failing notifier still records, then errors.
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, url: &str, message: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((url.to_string(), message.to_string()));
        if self.fail {
            return Err(NotifyError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

struct Harness {
    _tmp: TempDir,
    store: TargetStore,
    fetcher: Arc<ScriptedFetcher>,
    notifier: Arc<RecordingNotifier>,
    scheduler: Scheduler,
}

fn scheduler_for(
    store: &TargetStore,
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn Notifier>,
    unit: Duration,
) -> Scheduler {
    Scheduler::new(
        store.clone(),
        FetcherSet::uniform(fetcher),
        Detector::default(),
        notifier,
        SchedulerOptions {
            reconcile_interval: Duration::from_secs(3600),
            frequency_unit: unit,
        },
    )
}

/// One "minute" of target frequency lasts `unit` in these tests.
fn harness(fetcher: ScriptedFetcher, unit: Duration) -> Harness {
    harness_with_notifier(fetcher, RecordingNotifier::default(), unit)
}

fn harness_with_notifier(
    fetcher: ScriptedFetcher,
    notifier: RecordingNotifier,
    unit: Duration,
) -> Harness {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let store = TargetStore::new(tmp.path().join("targets.json"));
    let fetcher = Arc::new(fetcher);
    let notifier = Arc::new(notifier);
    let scheduler = scheduler_for(&store, fetcher.clone(), notifier.clone(), unit);
    Harness {
        _tmp: tmp,
        store,
        fetcher,
        notifier,
        scheduler,
    }
}

async fn wait_until<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn history_len(scheduler: &Scheduler, url: &str) -> usize {
    scheduler
        .snapshot()
        .await
        .iter()
        .find(|target| target.url == url)
        .map_or(0, |target| target.history.len())
}

#[tokio::test]
async fn test_register_is_idempotent() {
    let h = harness(
        ScriptedFetcher::default().script("https://a", &["x"]),
        Duration::from_secs(60),
    );
    let target = MonitorTarget::new("https://a", "#p", 5);
    let key = target.key();

    assert_eq!(h.scheduler.state(&key).await, TargetState::Unregistered);
    assert!(h.scheduler.register(target.clone()).await);
    assert!(!h.scheduler.register(target).await);
    assert_eq!(h.scheduler.snapshot().await.len(), 1);
    assert_eq!(h.scheduler.state(&key).await, TargetState::Running);

    h.scheduler.shutdown().await.expect("shutdown");
    assert_eq!(h.scheduler.state(&key).await, TargetState::Stopped);
    assert!(!h.scheduler.register(MonitorTarget::new("https://b", "#p", 5)).await);
}

#[tokio::test]
async fn test_first_check_records_baseline_without_waiting() {
    let h = harness(
        ScriptedFetcher::default().script("https://a", &["Price: 10"]),
        Duration::from_secs(60),
    );
    h.store.add(NewTarget::new("https://a", "#price", 5)).unwrap();

    assert_eq!(h.scheduler.start().await.expect("start"), 1);
    let scheduler = &h.scheduler;
    wait_until("baseline", move || async move {
        history_len(scheduler, "https://a").await == 1
    })
    .await;
    h.scheduler.shutdown().await.expect("shutdown");

    let stored = h.store.load().unwrap();
    assert_eq!(stored[0].history.len(), 1);
    assert!(!stored[0].is_unseen());
    assert!(h.notifier.sent().is_empty(), "baseline must not notify");
}

#[tokio::test]
async fn test_change_is_notified_once_and_persisted() {
    let h = harness(
        ScriptedFetcher::default().script("https://shop", &["Price: 10", "Price: 10", "Price: 12"]),
        Duration::from_millis(20),
    );
    h.store.add(NewTarget::new("https://shop", "#price", 1)).unwrap();

    h.scheduler.start().await.expect("start");
    let (notifier, fetcher) = (&h.notifier, &h.fetcher);
    wait_until("notification", move || async move { !notifier.sent().is_empty() }).await;
    // Let a few more unchanged cycles pass.
    let calls = fetcher.calls("https://shop");
    wait_until("more checks", move || async move {
        fetcher.calls("https://shop") >= calls + 3
    })
    .await;
    h.scheduler.shutdown().await.expect("shutdown");

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "https://shop");
    assert!(sent[0].1.contains("Old:\nPrice: 10"), "{}", sent[0].1);
    assert!(sent[0].1.contains("New:\nPrice: 12"), "{}", sent[0].1);

    let stored = h.store.load().unwrap();
    assert_eq!(stored[0].history.len(), 2);
    assert_eq!(
        stored[0].history[1].diff.as_deref(),
        Some("Price: 1[-0-]{+2+}")
    );
}

#[tokio::test]
async fn test_unchanged_content_never_notifies() {
    let h = harness(
        ScriptedFetcher::default().script("https://a", &["steady"]),
        Duration::from_millis(20),
    );
    h.store.add(NewTarget::new("https://a", "#p", 1)).unwrap();

    h.scheduler.start().await.expect("start");
    let fetcher = &h.fetcher;
    wait_until("several checks", move || async move { fetcher.calls("https://a") >= 4 }).await;
    h.scheduler.shutdown().await.expect("shutdown");

    assert!(h.notifier.sent().is_empty());
    assert_eq!(h.store.load().unwrap()[0].history.len(), 1);
}

#[tokio::test]
async fn test_slow_target_does_not_delay_others() {
    let h = harness(
        ScriptedFetcher::default()
            .script("https://slow", &["s"])
            .delay("https://slow", Duration::from_secs(2))
            .script("https://fast", &["f"]),
        Duration::from_millis(20),
    );
    h.store.add(NewTarget::new("https://slow", "#p", 1)).unwrap();
    h.store.add(NewTarget::new("https://fast", "#p", 1)).unwrap();

    h.scheduler.start().await.expect("start");
    let fetcher = &h.fetcher;
    wait_until("fast target polled repeatedly", move || async move {
        fetcher.calls("https://fast") >= 5
    })
    .await;
    assert_eq!(history_len(&h.scheduler, "https://fast").await, 1);
    assert_eq!(history_len(&h.scheduler, "https://slow").await, 0);

    h.scheduler.shutdown().await.expect("shutdown");
    // The in-flight slow check drained before shutdown returned.
    assert_eq!(h.fetcher.calls("https://slow"), 1);
    let stored = h.store.load().unwrap();
    assert!(stored.iter().all(|target| target.history.len() == 1));
}

#[tokio::test]
async fn test_reconcile_picks_up_new_targets() {
    let h = harness(
        ScriptedFetcher::default()
            .script("https://a", &["a"])
            .script("https://b", &["b"]),
        Duration::from_secs(60),
    );
    h.store.add(NewTarget::new("https://a", "#p", 5)).unwrap();
    assert_eq!(h.scheduler.start().await.unwrap(), 1);

    // Added by another process while running.
    h.store.add(NewTarget::new("https://b", "#p", 5)).unwrap();
    assert_eq!(h.scheduler.reconcile().await, 1);
    assert_eq!(h.scheduler.reconcile().await, 0);
    assert_eq!(
        h.scheduler.state(&TargetKey::new("https://b", "#p")).await,
        TargetState::Running
    );

    let scheduler = &h.scheduler;
    wait_until("baseline for new target", move || async move {
        history_len(scheduler, "https://b").await == 1
    })
    .await;
    h.scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_persist_keeps_targets_added_elsewhere() {
    let h = harness(
        ScriptedFetcher::default().script("https://a", &["a"]),
        Duration::from_secs(60),
    );
    h.store.add(NewTarget::new("https://a", "#p", 5)).unwrap();
    h.scheduler.start().await.unwrap();

    h.store.add(NewTarget::new("https://late", "#p", 5)).unwrap();
    let scheduler = &h.scheduler;
    wait_until("baseline", move || async move {
        history_len(scheduler, "https://a").await == 1
    })
    .await;
    h.scheduler.shutdown().await.unwrap();

    let stored = h.store.load().unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].history.len(), 1);
    assert_eq!(stored[1].url, "https://late");
    assert!(stored[1].is_unseen());
}

#[tokio::test]
async fn test_start_fails_on_unreadable_store() {
    let h = harness(ScriptedFetcher::default(), Duration::from_secs(60));
    std::fs::write(h.store.path(), "[{broken").unwrap();

    let err = h.scheduler.start().await.unwrap_err();
    assert!(format!("{err:#}").contains("malformed"), "{err:#}");
}

#[tokio::test]
async fn test_check_all_reports_in_store_order() {
    let h = harness(
        ScriptedFetcher::default()
            .script("https://a", &["one"])
            .script("https://c", &["three"]),
        Duration::from_secs(60),
    );
    h.store.add(NewTarget::new("https://a", "#p", 5)).unwrap();
    h.store.add(NewTarget::new("https://b", "#p", 5)).unwrap();
    h.store.add(NewTarget::new("https://c", "#p", 5)).unwrap();

    let reports = h.scheduler.check_all().await.expect("check all");
    let urls: Vec<_> = reports.iter().map(|r| r.key.url.as_str()).collect();
    assert_eq!(urls, ["https://a", "https://b", "https://c"]);
    assert!(matches!(reports[0].result, Ok(CheckOutcome::Baseline)));
    assert!(matches!(
        reports[1].result,
        Err(FetchError::SelectorNotFound { .. })
    ));
    assert!(matches!(reports[2].result, Ok(CheckOutcome::Baseline)));

    let stored = h.store.load().unwrap();
    assert_eq!(stored[0].history.len(), 1);
    assert!(stored[1].is_unseen());
    assert_eq!(stored[2].history.len(), 1);
}

#[tokio::test]
async fn test_failed_notification_and_fetch_error_keep_polling() {
    let h = harness_with_notifier(
        ScriptedFetcher::default()
            .script("https://shop", &["Price: 10", "Price: 10", "Price: 12"])
            .fail_on("https://shop", 1),
        RecordingNotifier::failing(),
        Duration::from_millis(20),
    );
    h.store.add(NewTarget::new("https://shop", "#price", 1)).unwrap();

    h.scheduler.start().await.expect("start");
    let scheduler = &h.scheduler;
    wait_until("change recorded after a failed fetch", move || async move {
        history_len(scheduler, "https://shop").await == 2
    })
    .await;
    let (fetcher, calls) = (&h.fetcher, h.fetcher.calls("https://shop"));
    wait_until("polling continues", move || async move {
        fetcher.calls("https://shop") >= calls + 2
    })
    .await;
    h.scheduler.shutdown().await.expect("shutdown");

    // One attempt for the one change, even though it failed.
    assert_eq!(h.notifier.sent().len(), 1);

    let stored = h.store.load().unwrap();
    let target = &stored[0];
    assert_eq!(target.history.len(), 2);
    assert_eq!(target.last_fingerprint, target.history[1].fingerprint);
    assert_eq!(target.history[1].diff.as_deref(), Some("Price: 1[-0-]{+2+}"));
}

/// Breaks the store file on its first fetch, simulating a save that cannot land.
struct StoreBreakingFetcher {
    store_path: PathBuf,
    broken: AtomicBool,
}

#[async_trait]
impl Fetcher for StoreBreakingFetcher {
    async fn fetch(&self, _url: &str, _selector: &str) -> Result<String, FetchError> {
        if !self.broken.swap(true, Ordering::SeqCst) {
            std::fs::write(&self.store_path, "[{broken").unwrap();
        }
        Ok("Price: 10".to_string())
    }
}

#[tokio::test]
async fn test_failed_save_is_retried_on_next_trigger() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let store = TargetStore::new(tmp.path().join("targets.json"));
    store.add(NewTarget::new("https://a", "#p", 5)).unwrap();
    let fetcher = Arc::new(StoreBreakingFetcher {
        store_path: store.path().to_path_buf(),
        broken: AtomicBool::new(false),
    });
    let scheduler = scheduler_for(
        &store,
        fetcher,
        Arc::new(RecordingNotifier::default()),
        Duration::from_secs(60),
    );

    let err = scheduler.check_all().await.unwrap_err();
    assert!(format!("{err:#}").contains("malformed"), "{err:#}");
    // The baseline is still held in memory.
    assert_eq!(history_len(&scheduler, "https://a").await, 1);

    std::fs::write(store.path(), "[]").unwrap();
    let reports = scheduler.check_all().await.expect("second check");
    assert!(reports.is_empty());

    let stored = store.load().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].url, "https://a");
    assert_eq!(stored[0].history.len(), 1);
}
