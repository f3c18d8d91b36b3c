//! The hybrid retrieval engine: fusion of vector and keyword rankings
//! across memory items and raw turns, plus the audit and shared
//! export/import operations that share its read path over the same
//! tables, and the HMAC helper shared-export is the only caller of.

mod audit;
mod hmac_helper;
mod shared;
mod types;

pub use audit::AuditResult;
pub use hmac_helper::{sign, verify};
pub use shared::{ExportResult, ImportResult};
pub use types::{Chunk, ChunkRef, DebugScores, RetrievalMode, RetrievalScope, RetrieveResult, ScoreDetail};

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use mnemo_cache::{estimate_tokens, reciprocal_rank_fusion};
use mnemo_core::{Metrics, MnemoError};
use mnemo_llm::LlmMediator;
use mnemo_store::Store;

use types::recency_weight;

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub recency_bias: f32,
    pub enable_llm_rerank: bool,
    pub hmac_secret: Option<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 8,
            recency_bias: 1.0,
            enable_llm_rerank: false,
            hmac_secret: None,
        }
    }
}

#[derive(Clone)]
pub struct RetrievalEngine {
    store: Store,
    llm: Arc<LlmMediator>,
    metrics: Arc<Metrics>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(store: Store, llm: Arc<LlmMediator>, metrics: Arc<Metrics>, config: RetrievalConfig) -> Self {
        Self { store, llm, metrics, config }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn llm(&self) -> &LlmMediator {
        &self.llm
    }

    fn hmac_secret(&self) -> Option<&str> {
        self.config.hmac_secret.as_deref()
    }

    /// Fuses vector and keyword candidates into a ranked, token-budgeted
    /// context window for a thread.
    #[allow(clippy::too_many_arguments)]
    pub async fn retrieve_context(
        &self,
        thread_id: Uuid,
        query: &str,
        mode: RetrievalMode,
        scope: RetrievalScope,
        top_k: usize,
        token_budget: usize,
        recency_bias: Option<f32>,
        explain: bool,
    ) -> Result<RetrieveResult, MnemoError> {
        let recency_bias = recency_bias.unwrap_or(self.config.recency_bias);
        let query_embedding = self.llm.embed(&[query.to_string()]).await?.into_iter().next().unwrap_or_default();

        let mut ranked_lists: Vec<(String, Vec<ChunkRef>)> = Vec::new();
        let mut texts: HashMap<ChunkRef, String> = HashMap::new();
        let mut candidate_counts: HashMap<String, usize> = HashMap::new();

        if scope.includes_distilled() {
            let vector_items = self.store.vector_active_memory_items(thread_id, &query_embedding, top_k as i64).await?;
            let mut vector_scored: Vec<(ChunkRef, f32)> = vector_items
                .iter()
                .map(|(item, distance)| {
                    let sim = (1.0 - distance) as f32;
                    let score = sim * item.importance * recency_weight(item.updated_at, recency_bias);
                    (ChunkRef::Memory(item.id), score)
                })
                .collect();
            vector_scored.sort_by(|a, b| b.1.total_cmp(&a.1));
            for (item, _) in &vector_items {
                texts.insert(ChunkRef::Memory(item.id), item.embeddable_text());
            }
            candidate_counts.insert("vector_memory".to_string(), vector_scored.len());
            ranked_lists.push(("vector_memory".to_string(), vector_scored.into_iter().map(|(r, _)| r).collect()));

            let keyword_items = self.store.keyword_active_memory_items(thread_id, query, top_k as i64).await?;
            let mut keyword_scored: Vec<(ChunkRef, f32)> = keyword_items
                .iter()
                .map(|item| (ChunkRef::Memory(item.id), item.importance))
                .collect();
            keyword_scored.sort_by(|a, b| b.1.total_cmp(&a.1));
            for item in &keyword_items {
                texts.entry(ChunkRef::Memory(item.id)).or_insert_with(|| item.embeddable_text());
            }
            candidate_counts.insert("keyword_memory".to_string(), keyword_scored.len());
            ranked_lists.push(("keyword_memory".to_string(), keyword_scored.into_iter().map(|(r, _)| r).collect()));
        }

        // Fast mode never retrieves raw turns even under hybrid scope.
        if scope.includes_raw() && mode == RetrievalMode::Deep {
            let vector_turns = self.store.vector_candidate_turns(thread_id, &query_embedding, top_k as i64).await?;
            let mut vector_scored: Vec<(ChunkRef, f32)> = vector_turns
                .iter()
                .map(|(turn, distance)| {
                    let sim = (1.0 - distance) as f32;
                    let score = sim * recency_weight(turn.ts, recency_bias);
                    (ChunkRef::Turn(turn.id), score)
                })
                .collect();
            vector_scored.sort_by(|a, b| b.1.total_cmp(&a.1));
            for (turn, _) in &vector_turns {
                texts.insert(ChunkRef::Turn(turn.id), turn.text.clone());
            }
            candidate_counts.insert("vector_turns".to_string(), vector_scored.len());
            ranked_lists.push(("vector_turns".to_string(), vector_scored.into_iter().map(|(r, _)| r).collect()));

            let keyword_turns = self.store.keyword_candidate_turns(thread_id, query, top_k as i64).await?;
            // Already sorted ts desc by the query; constant 0.5 score per spec.
            let keyword_refs: Vec<ChunkRef> = keyword_turns.iter().map(|t| ChunkRef::Turn(t.id)).collect();
            for turn in &keyword_turns {
                texts.entry(ChunkRef::Turn(turn.id)).or_insert_with(|| turn.text.clone());
            }
            candidate_counts.insert("keyword_turns".to_string(), keyword_refs.len());
            ranked_lists.push(("keyword_turns".to_string(), keyword_refs));
        }

        // Per-list rank position, kept for `explain`.
        let mut rank_positions: HashMap<ChunkRef, HashMap<String, usize>> = HashMap::new();
        for (name, list) in &ranked_lists {
            for (idx, item) in list.iter().enumerate() {
                rank_positions.entry(*item).or_default().insert(name.clone(), idx + 1);
            }
        }

        let lists_only: Vec<Vec<ChunkRef>> = ranked_lists.iter().map(|(_, l)| l.clone()).collect();
        let fused = reciprocal_rank_fusion(&lists_only, 60.0);

        let mut ordered: Vec<(ChunkRef, f64)> = fused.into_iter().collect();
        ordered.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut chunks = Vec::new();
        let mut running_tokens = 0usize;
        for (chunk_ref, fused_score) in &ordered {
            let Some(text) = texts.get(chunk_ref) else { continue };
            let estimate = estimate_tokens(text);
            if running_tokens + estimate > token_budget {
                continue; // a smaller later chunk may still fit
            }
            running_tokens += estimate;

            let (source, id) = match chunk_ref {
                ChunkRef::Memory(id) => ("memory_item", *id),
                ChunkRef::Turn(id) => ("turn", *id),
            };
            let score_detail = explain.then(|| ScoreDetail {
                fused_score: *fused_score,
                ranks: rank_positions.get(chunk_ref).cloned().unwrap_or_default(),
            });
            chunks.push(Chunk { source: source.to_string(), id, text: text.clone(), score_detail });
        }

        let mut debug_scores = DebugScores { candidate_counts, reranked: false, rerank_dropped: 0 };

        let low_confidence_threshold = (top_k / 4).max(2);
        let low_confidence = chunks.len() < low_confidence_threshold;
        if low_confidence {
            self.metrics.incr("retrieval.low_confidence");
        }

        if self.config.enable_llm_rerank && mode == RetrievalMode::Deep && !chunks.is_empty() {
            chunks = self.rerank(chunks, &mut debug_scores).await?;
        }

        let stale_references = self.stale_references(thread_id, query).await?;

        Ok(RetrieveResult {
            chunks,
            est_tokens: running_tokens,
            low_confidence,
            debug_scores,
            stale_references,
        })
    }

    async fn rerank(&self, chunks: Vec<Chunk>, debug_scores: &mut DebugScores) -> Result<Vec<Chunk>, MnemoError> {
        let original_ids: std::collections::HashSet<Uuid> = chunks.iter().map(|c| c.id).collect();
        let top20: Vec<&Chunk> = chunks.iter().take(20).collect();
        let rendered: Vec<serde_json::Value> = top20
            .iter()
            .map(|c| {
                let mut text = c.text.clone();
                text.truncate(200);
                serde_json::json!({ "id": c.id, "text": text })
            })
            .collect();

        let system = "Pick the best chunks. Rerank the provided context chunks by relevance and \
             return the top 8 as a JSON array of ids.";
        let user = serde_json::to_string(&rendered).unwrap_or_default();
        let response = self.llm.chat_json(system, &user).await?;

        let ids: Vec<Uuid> = response
            .get("ids")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().and_then(|s| s.parse().ok())).collect())
            .unwrap_or_default();

        if ids.is_empty() {
            return Ok(chunks);
        }

        let by_id: HashMap<Uuid, Chunk> = chunks.into_iter().map(|c| (c.id, c)).collect();
        let reordered: Vec<Chunk> = ids
            .into_iter()
            .filter(|id| original_ids.contains(id))
            .filter_map(|id| by_id.get(&id).cloned())
            .collect();

        debug_scores.reranked = true;
        debug_scores.rerank_dropped = original_ids.len().saturating_sub(reordered.len());

        Ok(reordered)
    }

    /// FTS over the thread's `superseded` items, up to 5 human-readable
    /// warnings.
    async fn stale_references(&self, thread_id: Uuid, query_text: &str) -> Result<Vec<String>, MnemoError> {
        let matches = self.store.superseded_matching(thread_id, query_text, 5).await?;
        Ok(matches
            .into_iter()
            .map(|item| format!("Plan references superseded item '{}'…", item.title))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_confidence_threshold_matches_spec_floor() {
        // max(2, top_k/4) with top_k=4 is max(2,1)=2
        assert_eq!((4usize / 4).max(2), 2);
        // with top_k=40 is max(2,10)=10
        assert_eq!((40usize / 4).max(2), 10);
    }
}
