use chrono::{DateTime, Utc};
use uuid::Uuid;

use mnemo_core::{JobType, MnemoError, Turn};

use crate::LifecycleEngine;

/// `ingest_turn`'s embed/distill scheduling knobs.
#[derive(Debug, Clone, Copy)]
pub struct IngestConfig {
    /// `ingest_embed_sync`: embed synchronously instead of enqueuing a job.
    pub embed_sync: bool,
    /// `auto_distill_on_ingest`: always enqueue a `distill_turn` job.
    pub auto_distill: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            embed_sync: false,
            auto_distill: false,
        }
    }
}

impl LifecycleEngine {
    /// Turn ingestion. Idempotent on `(thread, external_turn_id)`.
    #[allow(clippy::too_many_arguments)]
    pub async fn ingest_turn(
        &self,
        thread_id: Uuid,
        role: &str,
        text: &str,
        ts: Option<DateTime<Utc>>,
        branch_id: Option<&str>,
        external_turn_id: Option<&str>,
        embed_now: bool,
    ) -> Result<Turn, MnemoError> {
        let (turn, was_inserted) = self
            .store
            .insert_turn_idempotent(thread_id, role, text, ts, branch_id, external_turn_id)
            .await?;

        if !was_inserted {
            return Ok(turn);
        }

        self.store.touch_thread(thread_id).await?;

        if embed_now {
            if self.ingest.embed_sync {
                let embedding = self.llm.embed(&[turn.text.clone()]).await?.into_iter().next().unwrap_or_default();
                self.store.set_turn_embedding(turn.id, embedding).await?;
            } else {
                self.store
                    .enqueue_job(
                        JobType::EmbedTurn,
                        serde_json::json!({ "turn_id": turn.id, "text": turn.text }),
                        None,
                    )
                    .await?;
            }
        }

        if self.ingest.auto_distill {
            self.store
                .enqueue_job(
                    JobType::DistillTurn,
                    serde_json::json!({ "thread_id": thread_id, "turn_id": turn.id }),
                    None,
                )
                .await?;
        }

        Ok(turn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_async_embed_and_no_auto_distill() {
        let config = IngestConfig::default();
        assert!(!config.embed_sync);
        assert!(!config.auto_distill);
    }
}
