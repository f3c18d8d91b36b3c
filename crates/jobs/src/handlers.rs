use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use mnemo_core::{Job, JobType, MnemoError};
use mnemo_lifecycle::LifecycleEngine;
use mnemo_llm::LlmMediator;
use mnemo_store::Store;

use crate::RetentionConfig;

pub(crate) async fn dispatch(
    store: &Store,
    llm: &Arc<LlmMediator>,
    lifecycle: &LifecycleEngine,
    retention: &RetentionConfig,
    job: &Job,
) -> Result<(), MnemoError> {
    match job.job_type {
        JobType::EmbedTurn => embed_turn(store, llm, job).await,
        JobType::DistillTurn => distill_turn(lifecycle, job).await,
        JobType::RetentionCleanup => retention_cleanup(store, retention).await,
    }
}

pub(crate) fn job_type_name(job_type: JobType) -> &'static str {
    match job_type {
        JobType::EmbedTurn => "embed_turn",
        JobType::DistillTurn => "distill_turn",
        JobType::RetentionCleanup => "retention_cleanup",
    }
}

async fn embed_turn(store: &Store, llm: &Arc<LlmMediator>, job: &Job) -> Result<(), MnemoError> {
    let turn_id: Uuid = job
        .payload
        .get("turn_id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| MnemoError::JobHandlerError("embed_turn payload missing turn_id".to_string()))?;

    let turn = store.get_turn(turn_id).await?;
    if turn.embedding.is_some() {
        return Ok(()); // already embedded, no-op
    }

    let text = job
        .payload
        .get("text")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or(turn.text);

    let embedding = llm.embed(&[text]).await?.into_iter().next().unwrap_or_default();
    store.set_turn_embedding(turn_id, embedding).await?;
    Ok(())
}

async fn distill_turn(lifecycle: &LifecycleEngine, job: &Job) -> Result<(), MnemoError> {
    let thread_id: Uuid = job
        .payload
        .get("thread_id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| MnemoError::JobHandlerError("distill_turn payload missing thread_id".to_string()))?;
    let turn_id: Uuid = job
        .payload
        .get("turn_id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| MnemoError::JobHandlerError("distill_turn payload missing turn_id".to_string()))?;

    lifecycle.distill_extract(thread_id, turn_id, 4, true).await?;
    Ok(())
}

async fn retention_cleanup(store: &Store, retention: &RetentionConfig) -> Result<(), MnemoError> {
    if retention.days_turns > 0 {
        let cutoff = Utc::now() - chrono::Duration::days(retention.days_turns);
        let deleted = store.delete_turns_before(cutoff).await?;
        tracing::info!(deleted, "retention: turns swept");
    }
    if retention.days_memory > 0 {
        let cutoff = Utc::now() - chrono::Duration::days(retention.days_memory);
        let deleted = store.delete_memory_items_before(cutoff).await?;
        tracing::info!(deleted, "retention: memory items swept");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_names_are_snake_case() {
        assert_eq!(job_type_name(JobType::EmbedTurn), "embed_turn");
        assert_eq!(job_type_name(JobType::DistillTurn), "distill_turn");
        assert_eq!(job_type_name(JobType::RetentionCleanup), "retention_cleanup");
    }
}
