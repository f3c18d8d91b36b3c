//! The memory lifecycle engine: dedup/supersede decisions over the
//! distilled memory graph, plus the two operations that feed it — turn
//! ingestion and the distill orchestrator. All three are thread-scoped
//! mutations of the same store tables and share the upsert path, so they
//! live together.

mod distill;
mod ingest;
mod upsert;

pub use distill::{DistillCounts, DistillResult};
pub use ingest::IngestConfig;
pub use upsert::{DedupConfig, MemoryItemPayload, UpsertOutcome};

use std::sync::Arc;

use mnemo_core::Metrics;
use mnemo_llm::LlmMediator;
use mnemo_store::Store;

/// The flagged tokens whose presence in a title/statement (case-folded)
/// bumps importance by +0.10 — a stability/priority bias the lifecycle
/// engine applies before every persist.
const FLAGGED_TOKENS: &[&str] = &["final", "kesin", "asla", "karar"];

/// Owns the store handle and LLM mediator every lifecycle operation needs.
/// Cheap to clone: `Store` wraps a pool, `LlmMediator` is held behind `Arc`.
#[derive(Clone)]
pub struct LifecycleEngine {
    store: Store,
    llm: Arc<LlmMediator>,
    dedup: DedupConfig,
    ingest: IngestConfig,
    metrics: Arc<Metrics>,
}

impl LifecycleEngine {
    pub fn new(
        store: Store,
        llm: Arc<LlmMediator>,
        dedup: DedupConfig,
        ingest: IngestConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            llm,
            dedup,
            ingest,
            metrics,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

fn heuristic_importance_bump(
    title: &str,
    statement: &str,
    tags: &[String],
    affects: &[String],
    importance: f32,
) -> f32 {
    let folded = format!("{title} {statement}").to_lowercase();
    let mut bumped = importance;
    if FLAGGED_TOKENS.iter().any(|tok| folded.contains(tok)) {
        bumped += 0.10;
    }
    if tags.iter().any(|t| t == "security" || t == "performance") {
        bumped += 0.10;
    }
    if affects.iter().any(|a| a == "core") {
        bumped += 0.05;
    }
    bumped.clamp(0.0, 1.0)
}

#[cfg(test)]
mod heuristic_tests {
    use super::*;

    #[test]
    fn flagged_token_bumps_importance() {
        let bumped = heuristic_importance_bump("Final decision", "stop using X", &[], &[], 0.5);
        assert!((bumped - 0.6).abs() < 1e-6);
    }

    #[test]
    fn security_tag_bumps_importance() {
        let bumped = heuristic_importance_bump("t", "s", &["security".to_string()], &[], 0.5);
        assert!((bumped - 0.6).abs() < 1e-6);
    }

    #[test]
    fn core_affects_bumps_importance_by_smaller_amount() {
        let bumped = heuristic_importance_bump("t", "s", &[], &["core".to_string()], 0.5);
        assert!((bumped - 0.55).abs() < 1e-6);
    }

    #[test]
    fn bumps_stack_but_clamp_to_one() {
        let bumped = heuristic_importance_bump(
            "Final karar",
            "s",
            &["security".to_string()],
            &["core".to_string()],
            0.9,
        );
        assert_eq!(bumped, 1.0);
    }
}
