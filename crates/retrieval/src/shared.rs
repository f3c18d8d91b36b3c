use chrono::{DateTime, Utc};
use uuid::Uuid;

use mnemo_core::{MemoryItemType, MnemoError};
use mnemo_store::NewMemoryItem;

use crate::hmac_helper;
use crate::RetrievalEngine;

#[derive(Debug, Clone, serde::Serialize)]
pub struct ExportResult {
    pub package_id: Uuid,
    pub payload: serde_json::Value,
    pub signature: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ImportResult {
    pub thread_id: Uuid,
    pub imported_count: usize,
}

/// Types allowed into an imported thread.
const IMPORTABLE_TYPES: &[MemoryItemType] = &[
    MemoryItemType::Decision,
    MemoryItemType::Constraint,
    MemoryItemType::Mistake,
];

impl RetrievalEngine {
    /// Requires an HMAC secret, gathers active items of the requested types
    /// (plus `mistake` when `include_mistakes`), signs the canonical
    /// payload, and persists a `SharedPackage`.
    pub async fn shared_export(
        &self,
        thread_id: Uuid,
        types: &[MemoryItemType],
        include_mistakes: bool,
        ttl_s: i64,
    ) -> Result<ExportResult, MnemoError> {
        let secret = self
            .hmac_secret()
            .ok_or_else(|| MnemoError::Validation("shared export requires an HMAC secret configured".to_string()))?;

        let mut wanted: Vec<MemoryItemType> = types.to_vec();
        if include_mistakes && !wanted.contains(&MemoryItemType::Mistake) {
            wanted.push(MemoryItemType::Mistake);
        }

        let items = self.store().list_active_by_types(thread_id, &wanted).await?;
        let created_at = Utc::now();
        let expires_at = created_at + chrono::Duration::seconds(ttl_s);

        let items_json: Vec<serde_json::Value> = items
            .iter()
            .map(|item| {
                serde_json::json!({
                    "item_type": item.item_type,
                    "title": item.title,
                    "statement": item.statement,
                    "importance": item.importance,
                    "confidence": item.confidence,
                    "severity": item.severity,
                    "tags": item.tags,
                    "affects": item.affects,
                    "code_refs": item.code_refs,
                })
            })
            .collect();

        let payload = serde_json::json!({
            "thread_id": thread_id,
            "items": items_json,
            "created_at": created_at,
            "expires_at": expires_at,
        });
        let signature = hmac_helper::sign(&payload, secret);

        let package = self
            .store()
            .insert_shared_package(expires_at, payload.clone(), &signature, serde_json::json!({}))
            .await?;

        Ok(ExportResult {
            package_id: package.id,
            payload,
            signature,
        })
    }

    /// Verifies the signature, rejects expired payloads, creates a new
    /// thread under the caller-supplied plan, and inserts every
    /// decision/constraint/mistake item as active with
    /// `metadata.source = "external"`.
    ///
    /// Resolves the spec's open question on thread creation by requiring a
    /// `plan_id` argument rather than inventing a synthetic "imported" plan —
    /// see DESIGN.md.
    pub async fn shared_import(
        &self,
        plan_id: Uuid,
        payload: serde_json::Value,
        signature: &str,
    ) -> Result<ImportResult, MnemoError> {
        let secret = self
            .hmac_secret()
            .ok_or_else(|| MnemoError::Validation("shared import requires an HMAC secret configured".to_string()))?;

        if !hmac_helper::verify(&payload, secret, signature) {
            return Err(MnemoError::SignatureInvalid);
        }

        let expires_at: DateTime<Utc> = payload
            .get("expires_at")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .ok_or_else(|| MnemoError::Validation("payload missing expires_at".to_string()))?;
        if expires_at < Utc::now() {
            return Err(MnemoError::PackageExpired);
        }

        let thread = self.store().create_thread(plan_id, serde_json::json!({})).await?;

        let items = payload.get("items").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let mut imported_count = 0usize;
        for raw in items {
            let item_type: MemoryItemType = match raw.get("item_type").and_then(|v| serde_json::from_value(v.clone()).ok()) {
                Some(t) => t,
                None => continue,
            };
            if !IMPORTABLE_TYPES.contains(&item_type) {
                continue;
            }

            let title = raw.get("title").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let statement = raw.get("statement").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let importance = raw.get("importance").and_then(|v| v.as_f64()).unwrap_or(0.5) as f32;
            let confidence = raw.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.5) as f32;
            let severity = raw.get("severity").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;
            let str_list = |key: &str| -> Vec<String> {
                raw.get(key)
                    .and_then(|v| v.as_array())
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default()
            };

            self.store()
                .insert_memory_item(NewMemoryItem {
                    thread_id: thread.id,
                    item_type,
                    title,
                    statement,
                    importance,
                    confidence,
                    severity,
                    tags: str_list("tags"),
                    affects: str_list("affects"),
                    code_refs: str_list("code_refs"),
                    evidence_turn_ids: Vec::new(),
                    embedding: None,
                    supersedes_id: None,
                    supersede_reason: None,
                    metadata: serde_json::json!({ "source": "external" }),
                })
                .await?;
            imported_count += 1;
        }

        Ok(ImportResult {
            thread_id: thread.id,
            imported_count,
        })
    }
}
