use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use mnemo_core::JobType;

use crate::JobEngine;

/// `retention_days_turns`/`retention_days_memory` gate the two sweeps inside
/// the `retention_cleanup` handler itself; this config only carries the
/// scheduler's own enqueue cadence plus the two day counts the handler reads.
#[derive(Debug, Clone, Copy)]
pub struct RetentionConfig {
    pub days_turns: i64,
    pub days_memory: i64,
    pub cleanup_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days_turns: 0,
            days_memory: 0,
            cleanup_interval: Duration::from_secs(3600),
        }
    }
}

/// Periodically enqueues a `retention_cleanup` job at `cleanup_interval_s`.
/// Responds to cancellation between sleeps.
pub fn spawn_retention_scheduler(engine: JobEngine, mut stop_rx: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
    let interval = engine.retention.cleanup_interval;
    tokio::spawn(async move {
        info!("retention scheduler starting");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                }
            }
            if *stop_rx.borrow() {
                break;
            }
            if let Err(err) = engine.enqueue(JobType::RetentionCleanup, serde_json::json!({}), None).await {
                tracing::warn!(%err, "failed to enqueue retention_cleanup job");
            }
        }
        info!("retention scheduler stopped");
    })
}
