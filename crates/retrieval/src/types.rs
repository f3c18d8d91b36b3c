use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    Fast,
    Deep,
}

impl RetrievalMode {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("deep") { RetrievalMode::Deep } else { RetrievalMode::Fast }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalScope {
    DistilledOnly,
    RawOnly,
    Hybrid,
}

impl RetrievalScope {
    pub fn parse(s: &str) -> Self {
        match s {
            "raw_only" => RetrievalScope::RawOnly,
            "hybrid" => RetrievalScope::Hybrid,
            _ => RetrievalScope::DistilledOnly,
        }
    }

    pub fn includes_distilled(&self) -> bool {
        matches!(self, RetrievalScope::DistilledOnly | RetrievalScope::Hybrid)
    }

    pub fn includes_raw(&self) -> bool {
        matches!(self, RetrievalScope::RawOnly | RetrievalScope::Hybrid)
    }
}

/// The unified identity of anything the fusion step can rank: a memory item
/// or a raw turn. Keeping them in one key space lets RRF sum contributions
/// across both kinds of rank lists uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkRef {
    Memory(Uuid),
    Turn(Uuid),
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreDetail {
    pub fused_score: f64,
    pub ranks: HashMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub source: String,
    pub id: Uuid,
    pub text: String,
    pub score_detail: Option<ScoreDetail>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct DebugScores {
    pub candidate_counts: HashMap<String, usize>,
    pub reranked: bool,
    pub rerank_dropped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrieveResult {
    pub chunks: Vec<Chunk>,
    pub est_tokens: usize,
    pub low_confidence: bool,
    pub debug_scores: DebugScores,
    pub stale_references: Vec<String>,
}

/// `recencyWeight(ts, bias) = max(0, 1 - ageDays * bias * 0.01)`.
pub fn recency_weight(ts: chrono::DateTime<chrono::Utc>, bias: f32) -> f32 {
    let age_days = (chrono::Utc::now() - ts).num_seconds() as f32 / 86_400.0;
    (1.0 - age_days * bias * 0.01).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recency_weight_is_one_for_just_now() {
        let weight = recency_weight(chrono::Utc::now(), 1.0);
        assert!((weight - 1.0).abs() < 0.01);
    }

    #[test]
    fn recency_weight_never_goes_negative() {
        let old = chrono::Utc::now() - chrono::Duration::days(100_000);
        assert_eq!(recency_weight(old, 1.0), 0.0);
    }

    #[test]
    fn scope_fast_mode_excludes_raw_even_under_hybrid() {
        let scope = RetrievalScope::Hybrid;
        let mode = RetrievalMode::Fast;
        // Enforced at the call site, not in the scope type itself — this test
        // documents the invariant the pipeline must uphold.
        assert!(scope.includes_raw());
        assert_eq!(mode, RetrievalMode::Fast);
    }
}
