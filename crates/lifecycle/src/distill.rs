use uuid::Uuid;

use mnemo_core::{MemoryItemType, MnemoError};

use crate::{LifecycleEngine, MemoryItemPayload, UpsertOutcome};

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DistillCounts {
    pub inserted: u32,
    pub deduped: u32,
    pub superseded: u32,
}

#[derive(Debug, Clone)]
pub struct DistillResult {
    pub counts: DistillCounts,
    pub extracted: serde_json::Value,
}

const CATEGORIES: &[(&str, MemoryItemType)] = &[
    ("decisions", MemoryItemType::Decision),
    ("constraints", MemoryItemType::Constraint),
    ("mistakes", MemoryItemType::Mistake),
    ("assumptions", MemoryItemType::Assumption),
    ("open_questions", MemoryItemType::OpenQuestion),
];

impl LifecycleEngine {
    /// LLM extraction over the recent-turn window, optionally writing every
    /// extracted item through the upsert path.
    pub async fn distill_extract(
        &self,
        thread_id: Uuid,
        turn_id: Uuid,
        include_recent: i64,
        write_to_memory: bool,
    ) -> Result<DistillResult, MnemoError> {
        let mut recent = self.store().recent_turns(thread_id, include_recent).await?;
        recent.reverse(); // desc-by-ts -> chronological

        let rendered = recent
            .iter()
            .map(|turn| format!("{}: {}", turn.role, turn.text))
            .collect::<Vec<_>>()
            .join("\n");

        let system = "Extract distilled memory items from the conversation as strict JSON with keys \
             decisions, constraints, mistakes, assumptions, open_questions. Each item has fields \
             title, statement, importance, confidence, severity, tags, affects, code_refs.";
        let response = self.llm.chat_json(system, &rendered).await?;

        let mut counts = DistillCounts::default();
        if write_to_memory {
            for (key, item_type) in CATEGORIES {
                let Some(items) = response.get(*key).and_then(|v| v.as_array()) else {
                    continue;
                };
                for raw in items {
                    let payload = parse_payload(raw);
                    let (_, outcome) = self
                        .upsert_memory_item(thread_id, *item_type, payload, vec![turn_id])
                        .await?;
                    match outcome {
                        UpsertOutcome::Inserted => counts.inserted += 1,
                        UpsertOutcome::Deduped => counts.deduped += 1,
                        UpsertOutcome::Superseded => counts.superseded += 1,
                    }
                }
            }
        }

        Ok(DistillResult {
            counts,
            extracted: response,
        })
    }
}

fn parse_payload(raw: &serde_json::Value) -> MemoryItemPayload {
    let str_field = |key: &str| raw.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let f32_field = |key: &str, default: f32| raw.get(key).and_then(|v| v.as_f64()).map(|v| v as f32).unwrap_or(default);
    let str_list = |key: &str| {
        raw.get(key)
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    };

    MemoryItemPayload {
        title: str_field("title"),
        statement: str_field("statement"),
        importance: f32_field("importance", 0.5),
        confidence: f32_field("confidence", 0.5),
        severity: f32_field("severity", 0.0),
        tags: str_list("tags"),
        affects: str_list("affects"),
        code_refs: str_list("code_refs"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_payload_defaults_missing_fields() {
        let raw = serde_json::json!({ "title": "T", "statement": "S" });
        let payload = parse_payload(&raw);
        assert_eq!(payload.title, "T");
        assert_eq!(payload.importance, 0.5);
        assert_eq!(payload.severity, 0.0);
        assert!(payload.tags.is_empty());
    }
}
