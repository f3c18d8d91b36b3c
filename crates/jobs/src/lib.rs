//! The asynchronous job engine: durable queue, leasing, backoff, and the
//! worker loop powering embed/distill/retention tasks, plus the retention
//! scheduler that feeds it.

mod handlers;
mod retention;
mod worker;

pub use retention::{RetentionConfig, spawn_retention_scheduler};
pub use worker::spawn_worker_loop;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use mnemo_core::{Job, JobType, Metrics, MnemoError};
use mnemo_lifecycle::LifecycleEngine;
use mnemo_llm::LlmMediator;
use mnemo_store::Store;

#[derive(Debug, Clone, Copy)]
pub struct JobEngineConfig {
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl Default for JobEngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_attempts: 5,
        }
    }
}

#[derive(Clone)]
pub struct JobEngine {
    store: Store,
    llm: Arc<LlmMediator>,
    lifecycle: LifecycleEngine,
    config: JobEngineConfig,
    retention: RetentionConfig,
    metrics: Arc<Metrics>,
}

impl JobEngine {
    pub fn new(
        store: Store,
        llm: Arc<LlmMediator>,
        lifecycle: LifecycleEngine,
        config: JobEngineConfig,
        retention: RetentionConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            llm,
            lifecycle,
            config,
            retention,
            metrics,
        }
    }

    pub async fn enqueue(
        &self,
        job_type: JobType,
        payload: serde_json::Value,
        run_at: Option<DateTime<Utc>>,
    ) -> Result<Job, MnemoError> {
        self.store.enqueue_job(job_type, payload, run_at).await
    }

    /// One full iteration: claim a job if one is due, run its handler, and
    /// resolve it (`complete`/`fail`). Returns whether a job was claimed, so
    /// callers can decide whether to sleep before the next poll.
    pub async fn run_once(&self) -> Result<bool, MnemoError> {
        let Some(job) = self.store.fetch_next_job().await? else {
            return Ok(false);
        };

        let outcome = handlers::dispatch(&self.store, &self.llm, &self.lifecycle, &self.retention, &job).await;
        match outcome {
            Ok(()) => {
                self.store.complete_job(job.id).await?;
                self.metrics.incr(&format!("job.{}.done", handlers::job_type_name(job.job_type)));
            }
            Err(err) => {
                self.store.fail_job(job.id, &err.to_string(), self.config.max_attempts).await?;
                self.metrics.incr(&format!("job.{}.failed", handlers::job_type_name(job.job_type)));
            }
        }
        Ok(true)
    }

    pub fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    pub async fn complete(&self, id: Uuid) -> Result<(), MnemoError> {
        self.store.complete_job(id).await
    }
}
