use similar::TextDiff;
use uuid::Uuid;

use mnemo_core::{MemoryItem, MemoryItemType, MnemoError, validate_score};
use mnemo_store::NewMemoryItem;

use crate::{LifecycleEngine, heuristic_importance_bump};

/// Configured similarity thresholds driving the dedup/supersede decision.
/// Defaults per the original implementation.
#[derive(Debug, Clone, Copy)]
pub struct DedupConfig {
    pub dedup_sim_threshold: f32,
    pub supersede_sim_threshold: f32,
    pub supersede_guard_min: f32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            dedup_sim_threshold: 0.9,
            supersede_sim_threshold: 0.8,
            supersede_guard_min: 0.75,
        }
    }
}

/// Every writer-supplied field of a to-be-upserted memory item, prior to
/// the heuristic importance bump and embedding.
#[derive(Debug, Clone)]
pub struct MemoryItemPayload {
    pub title: String,
    pub statement: String,
    pub importance: f32,
    pub confidence: f32,
    pub severity: f32,
    pub tags: Vec<String>,
    pub affects: Vec<String>,
    pub code_refs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Deduped,
    Superseded,
}

/// Character-sequence similarity ratio in `[0, 1]`, matching Python's
/// `difflib.SequenceMatcher.ratio()` — used both as the text-fallback
/// similarity when a candidate has no embedding and as the 0.95
/// material-change test. Preserved verbatim per the spec's own warning that
/// an alternative (e.g. token Jaccard) would shift dedup/supersede
/// boundaries.
fn sequence_ratio(a: &str, b: &str) -> f32 {
    TextDiff::from_chars(a, b).ratio()
}

struct Candidate {
    item: MemoryItem,
    distance: Option<f64>,
}

impl LifecycleEngine {
    /// Central operation: dedup/supersede/insert a distilled memory item.
    pub async fn upsert_memory_item(
        &self,
        thread_id: Uuid,
        item_type: MemoryItemType,
        payload: MemoryItemPayload,
        evidence_turn_ids: Vec<Uuid>,
    ) -> Result<(MemoryItem, UpsertOutcome), MnemoError> {
        let importance = validate_score("importance", payload.importance)?;
        let confidence = validate_score("confidence", payload.confidence)?;
        let severity = validate_score("severity", payload.severity)?;

        // Step 1: heuristic scoring adjustment.
        let importance = heuristic_importance_bump(
            &payload.title,
            &payload.statement,
            &payload.tags,
            &payload.affects,
            importance,
        );

        // Step 2: embed "title statement".
        let embeddable = format!("{} {}", payload.title, payload.statement);
        let embedding = self
            .llm
            .embed(&[embeddable])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        // Step 3: candidate retrieval, merged by id.
        let vector_candidates = self
            .store
            .vector_candidate_memory_items(thread_id, item_type, &embedding, 5)
            .await?;
        let keyword_candidates = self
            .store
            .keyword_candidate_memory_items(thread_id, item_type, &payload.statement, 5)
            .await?;

        let mut merged: std::collections::HashMap<Uuid, Candidate> = std::collections::HashMap::new();
        for (item, distance) in vector_candidates {
            merged.insert(item.id, Candidate { item, distance: Some(distance) });
        }
        for item in keyword_candidates {
            merged.entry(item.id).or_insert_with(|| Candidate { item, distance: None });
        }

        // Step 4: best match by similarity.
        let mut best: Option<(f32, &Candidate)> = None;
        for candidate in merged.values() {
            let sim = match candidate.distance {
                Some(distance) => (1.0 - distance) as f32,
                None => sequence_ratio(&candidate.item.statement, &payload.statement),
            };
            if best.map(|(b, _)| sim > b).unwrap_or(true) {
                best = Some((sim, candidate));
            }
        }

        // Step 5: decision.
        if let Some((sim, candidate)) = best {
            if sim >= self.dedup.dedup_sim_threshold {
                if sim < self.dedup.supersede_guard_min {
                    // Defensive branch for dedupT < guardMin configurations.
                    return self
                        .insert_new(thread_id, item_type, payload, importance, confidence, severity, embedding, evidence_turn_ids, None, None)
                        .await
                        .map(|item| (item, UpsertOutcome::Inserted));
                }

                let relation = self
                    .llm_relation(&candidate.item.statement, &payload.statement)
                    .await?;
                if relation == "same" {
                    let deduped = self
                        .store
                        .merge_evidence(candidate.item.id, &evidence_turn_ids)
                        .await?;
                    self.metrics.incr("lifecycle.upsert.deduped");
                    return Ok((deduped, UpsertOutcome::Deduped));
                }
                return self
                    .insert_new(thread_id, item_type, payload, importance, confidence, severity, embedding, evidence_turn_ids, None, None)
                    .await
                    .map(|item| (item, UpsertOutcome::Inserted));
            }

            if sim >= self.dedup.supersede_sim_threshold {
                let material_ratio = sequence_ratio(&candidate.item.statement, &payload.statement);
                if material_ratio >= 0.95 {
                    return self
                        .insert_new(thread_id, item_type, payload, importance, confidence, severity, embedding, evidence_turn_ids, None, None)
                        .await
                        .map(|item| (item, UpsertOutcome::Inserted));
                }

                let relation = self
                    .llm_relation(&candidate.item.statement, &payload.statement)
                    .await?;
                if relation == "different" {
                    return self
                        .insert_new(thread_id, item_type, payload, importance, confidence, severity, embedding, evidence_turn_ids, None, None)
                        .await
                        .map(|item| (item, UpsertOutcome::Inserted));
                }

                let reason = self
                    .llm_supersede_reason(&candidate.item.statement, &payload.statement)
                    .await?;
                let new_item = self
                    .insert_new(
                        thread_id,
                        item_type,
                        payload,
                        importance,
                        confidence,
                        severity,
                        embedding,
                        evidence_turn_ids,
                        Some(candidate.item.id),
                        Some(reason),
                    )
                    .await?;
                self.store.mark_superseded(candidate.item.id, new_item.id).await?;
                self.metrics.incr("lifecycle.upsert.superseded");
                return Ok((new_item, UpsertOutcome::Superseded));
            }
        }

        self.metrics.incr("lifecycle.upsert.inserted");
        self.insert_new(thread_id, item_type, payload, importance, confidence, severity, embedding, evidence_turn_ids, None, None)
            .await
            .map(|item| (item, UpsertOutcome::Inserted))
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_new(
        &self,
        thread_id: Uuid,
        item_type: MemoryItemType,
        payload: MemoryItemPayload,
        importance: f32,
        confidence: f32,
        severity: f32,
        embedding: Vec<f32>,
        evidence_turn_ids: Vec<Uuid>,
        supersedes_id: Option<Uuid>,
        supersede_reason: Option<String>,
    ) -> Result<MemoryItem, MnemoError> {
        self.store
            .insert_memory_item(NewMemoryItem {
                thread_id,
                item_type,
                title: payload.title,
                statement: payload.statement,
                importance,
                confidence,
                severity,
                tags: payload.tags,
                affects: payload.affects,
                code_refs: payload.code_refs,
                evidence_turn_ids,
                embedding: Some(embedding),
                supersedes_id,
                supersede_reason,
                metadata: serde_json::json!({}),
            })
            .await
    }

    async fn llm_relation(&self, existing: &str, incoming: &str) -> Result<String, MnemoError> {
        let system = "Compare two memory statements. Decide the relation: same, update, or different.";
        let user = format!("Existing statement: {existing}\nNew statement: {incoming}");
        let response = self.llm.chat_json(system, &user).await?;
        Ok(response
            .get("relation")
            .and_then(|v| v.as_str())
            .unwrap_or("different")
            .to_string())
    }

    async fn llm_supersede_reason(&self, old: &str, new: &str) -> Result<String, MnemoError> {
        let system = "Write a short supersede reason explaining why the new statement replaces the old one.";
        let user = format!("Old: {old}\nNew: {new}");
        let response = self.llm.chat_json(system, &user).await?;
        Ok(response
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or("Replaced by an updated statement.")
            .to_string())
    }

    /// `memory.deprecate`: terminal, records `deprecate_reason` into metadata.
    pub async fn deprecate(&self, item_id: Uuid, reason: &str) -> Result<MemoryItem, MnemoError> {
        self.store.deprecate_item(item_id, reason).await
    }

    /// `memory.supersede`: admin-driven supersede, bypassing similarity scoring.
    pub async fn supersede(
        &self,
        old_item_id: Uuid,
        new_payload: MemoryItemPayload,
        reason: &str,
    ) -> Result<MemoryItem, MnemoError> {
        let old = self.store.get_memory_item(old_item_id).await?;
        let importance = validate_score("importance", new_payload.importance)?;
        let confidence = validate_score("confidence", new_payload.confidence)?;
        let severity = validate_score("severity", new_payload.severity)?;
        let embeddable = format!("{} {}", new_payload.title, new_payload.statement);
        let embedding = self.llm.embed(&[embeddable]).await?.into_iter().next().unwrap_or_default();

        let new_item = self
            .insert_new(
                old.thread_id,
                old.item_type,
                new_payload,
                importance,
                confidence,
                severity,
                embedding,
                Vec::new(),
                Some(old.id),
                Some(reason.to_string()),
            )
            .await?;
        self.store.mark_superseded(old.id, new_item.id).await?;
        Ok(new_item)
    }

    /// `score.override`: any non-null score, with an audit-trail event
    /// appended to `metadata.overrides[]`.
    pub async fn override_scores(
        &self,
        item_id: Uuid,
        importance: Option<f32>,
        confidence: Option<f32>,
        severity: Option<f32>,
        reason: &str,
    ) -> Result<MemoryItem, MnemoError> {
        if let Some(v) = importance {
            validate_score("importance", v)?;
        }
        if let Some(v) = confidence {
            validate_score("confidence", v)?;
        }
        if let Some(v) = severity {
            validate_score("severity", v)?;
        }
        self.store
            .override_scores(item_id, importance, confidence, severity, reason)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_ratio_identical_strings_is_one() {
        assert!((sequence_ratio("use postgres", "use postgres") - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sequence_ratio_disjoint_strings_is_low() {
        assert!(sequence_ratio("use postgres", "zzz qqq www") < 0.3);
    }

    #[test]
    fn dedup_defaults_match_spec() {
        let config = DedupConfig::default();
        assert_eq!(config.dedup_sim_threshold, 0.9);
        assert_eq!(config.supersede_sim_threshold, 0.8);
        assert_eq!(config.supersede_guard_min, 0.75);
    }
}
