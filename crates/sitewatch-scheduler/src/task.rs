use std::sync::Arc;
use std::time::Duration;

use sitewatch_core::TargetKey;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::scheduler::{Scheduler, Shared};

/// Poll one target until cancelled. The first tick fires immediately so a new
/// target gets its baseline without waiting a full period.
pub(crate) async fn run_target(shared: Arc<Shared>, key: TargetKey, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Not raced against cancellation: an in-flight check finishes and is saved.
        if shared.check_once(&key).await.is_none() {
            break;
        }
        if let Err(err) = shared.persist().await {
            warn!(
                target = %key,
                error = %format!("{err:#}"),
                "Failed to save targets, retrying after next check"
            );
        }
    }
    debug!(target = %key, "Target task stopped");
}

pub(crate) async fn run_reconciler(
    scheduler: Scheduler,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The immediate first tick is covered by the initial load in `start`.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                scheduler.reconcile().await;
            }
        }
    }
    debug!("Reconciler stopped");
}
