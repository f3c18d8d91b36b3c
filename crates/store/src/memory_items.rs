use chrono::{DateTime, Utc};
use mnemo_core::{MemoryItem, MemoryItemStatus, MemoryItemType, MnemoError};
use uuid::Uuid;

use crate::Store;

#[derive(sqlx::FromRow)]
struct MemoryItemDistanceRow {
    #[sqlx(flatten)]
    item: MemoryItem,
    distance: f64,
}

/// Every writable field of a new or replacement memory item. The lifecycle
/// engine computes these; the store only persists them.
pub struct NewMemoryItem {
    pub thread_id: Uuid,
    pub item_type: MemoryItemType,
    pub title: String,
    pub statement: String,
    pub importance: f32,
    pub confidence: f32,
    pub severity: f32,
    pub tags: Vec<String>,
    pub affects: Vec<String>,
    pub code_refs: Vec<String>,
    pub evidence_turn_ids: Vec<Uuid>,
    pub embedding: Option<Vec<f32>>,
    pub supersedes_id: Option<Uuid>,
    pub supersede_reason: Option<String>,
    pub metadata: serde_json::Value,
}

impl Store {
    pub async fn insert_memory_item(&self, new: NewMemoryItem) -> Result<MemoryItem, MnemoError> {
        let id = Uuid::new_v4();
        let item = sqlx::query_as::<_, MemoryItem>(
            "INSERT INTO memory_items
                (id, thread_id, item_type, status, title, statement, importance, confidence,
                 severity, tags, affects, code_refs, evidence_turn_ids, embedding,
                 supersedes_id, supersede_reason, metadata)
             VALUES ($1, $2, $3, 'active', $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             RETURNING *",
        )
        .bind(id)
        .bind(new.thread_id)
        .bind(new.item_type)
        .bind(&new.title)
        .bind(&new.statement)
        .bind(new.importance)
        .bind(new.confidence)
        .bind(new.severity)
        .bind(&new.tags)
        .bind(&new.affects)
        .bind(&new.code_refs)
        .bind(&new.evidence_turn_ids)
        .bind(new.embedding.map(pgvector::Vector::from))
        .bind(new.supersedes_id)
        .bind(&new.supersede_reason)
        .bind(&new.metadata)
        .fetch_one(self.pool())
        .await?;
        Ok(item)
    }

    pub async fn get_memory_item(&self, id: Uuid) -> Result<MemoryItem, MnemoError> {
        sqlx::query_as::<_, MemoryItem>("SELECT * FROM memory_items WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| MnemoError::NotFound(format!("memory item {id}")))
    }

    /// Union `new_evidence` into the existing item's evidence set and bump
    /// `updated_at` — the dedup path.
    pub async fn merge_evidence(
        &self,
        id: Uuid,
        new_evidence: &[Uuid],
    ) -> Result<MemoryItem, MnemoError> {
        sqlx::query_as::<_, MemoryItem>(
            "UPDATE memory_items
             SET evidence_turn_ids = (
                   SELECT array_agg(DISTINCT e) FROM unnest(evidence_turn_ids || $2) AS e
                 ),
                 updated_at = now()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(new_evidence)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| MnemoError::NotFound(format!("memory item {id}")))
    }

    /// Mark `old_id` superseded by `new_id`, the back-link half of the
    /// supersede decision. The forward link is set at insert time via
    /// `NewMemoryItem.supersedes_id`.
    pub async fn mark_superseded(&self, old_id: Uuid, new_id: Uuid) -> Result<(), MnemoError> {
        sqlx::query(
            "UPDATE memory_items SET status = 'superseded', superseded_by_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(old_id)
        .bind(new_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn deprecate_item(&self, id: Uuid, reason: &str) -> Result<MemoryItem, MnemoError> {
        sqlx::query_as::<_, MemoryItem>(
            "UPDATE memory_items
             SET status = 'deprecated',
                 metadata = jsonb_set(metadata, '{deprecate_reason}', to_jsonb($2::text)),
                 updated_at = now()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(reason)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| MnemoError::NotFound(format!("memory item {id}")))
    }

    /// Append `{fields, reason, timestamp}` to `metadata.overrides[]` and
    /// apply any non-null score updates.
    pub async fn override_scores(
        &self,
        id: Uuid,
        importance: Option<f32>,
        confidence: Option<f32>,
        severity: Option<f32>,
        reason: &str,
    ) -> Result<MemoryItem, MnemoError> {
        let mut fields = Vec::new();
        if importance.is_some() {
            fields.push("importance");
        }
        if confidence.is_some() {
            fields.push("confidence");
        }
        if severity.is_some() {
            fields.push("severity");
        }
        let event = serde_json::json!({
            "fields": fields,
            "reason": reason,
            "timestamp": Utc::now(),
        });

        sqlx::query_as::<_, MemoryItem>(
            "UPDATE memory_items
             SET importance = COALESCE($2, importance),
                 confidence = COALESCE($3, confidence),
                 severity = COALESCE($4, severity),
                 metadata = jsonb_set(
                   metadata,
                   '{overrides}',
                   COALESCE(metadata->'overrides', '[]'::jsonb) || $5::jsonb
                 ),
                 updated_at = now()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(importance)
        .bind(confidence)
        .bind(severity)
        .bind(event)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| MnemoError::NotFound(format!("memory item {id}")))
    }

    /// Top-5 by ascending cosine distance among active items of the same
    /// thread+type.
    pub async fn vector_candidate_memory_items(
        &self,
        thread_id: Uuid,
        item_type: MemoryItemType,
        query_embedding: &[f32],
        limit: i64,
    ) -> Result<Vec<(MemoryItem, f64)>, MnemoError> {
        let rows: Vec<MemoryItemDistanceRow> = sqlx::query_as(
            "SELECT m.*, (m.embedding <=> $3) AS distance FROM memory_items m
             WHERE m.thread_id = $1 AND m.item_type = $2 AND m.status = 'active' AND m.embedding IS NOT NULL
             ORDER BY m.embedding <=> $3 ASC LIMIT $4",
        )
        .bind(thread_id)
        .bind(item_type)
        .bind(pgvector::Vector::from(query_embedding.to_vec()))
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|row| (row.item, row.distance)).collect())
    }

    /// Up to 5 active items whose FTS matches `query_text`.
    pub async fn keyword_candidate_memory_items(
        &self,
        thread_id: Uuid,
        item_type: MemoryItemType,
        query_text: &str,
        limit: i64,
    ) -> Result<Vec<MemoryItem>, MnemoError> {
        Ok(sqlx::query_as::<_, MemoryItem>(
            "SELECT * FROM memory_items
             WHERE thread_id = $1 AND item_type = $2 AND status = 'active'
               AND statement_tsv @@ plainto_tsquery('english', $3)
             ORDER BY importance DESC LIMIT $4",
        )
        .bind(thread_id)
        .bind(item_type)
        .bind(query_text)
        .bind(limit)
        .fetch_all(self.pool())
        .await?)
    }

    /// Vector/keyword candidates scoped only by thread+status (used by the
    /// retrieval engine, which ranks across all types at once).
    pub async fn vector_active_memory_items(
        &self,
        thread_id: Uuid,
        query_embedding: &[f32],
        limit: i64,
    ) -> Result<Vec<(MemoryItem, f64)>, MnemoError> {
        let rows: Vec<MemoryItemDistanceRow> = sqlx::query_as(
            "SELECT m.*, (m.embedding <=> $2) AS distance FROM memory_items m
             WHERE m.thread_id = $1 AND m.status = 'active' AND m.embedding IS NOT NULL
             ORDER BY m.embedding <=> $2 ASC LIMIT $3",
        )
        .bind(thread_id)
        .bind(pgvector::Vector::from(query_embedding.to_vec()))
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|row| (row.item, row.distance)).collect())
    }

    pub async fn keyword_active_memory_items(
        &self,
        thread_id: Uuid,
        query_text: &str,
        limit: i64,
    ) -> Result<Vec<MemoryItem>, MnemoError> {
        Ok(sqlx::query_as::<_, MemoryItem>(
            "SELECT * FROM memory_items
             WHERE thread_id = $1 AND status = 'active' AND statement_tsv @@ plainto_tsquery('english', $2)
             ORDER BY importance DESC LIMIT $3",
        )
        .bind(thread_id)
        .bind(query_text)
        .bind(limit)
        .fetch_all(self.pool())
        .await?)
    }

    pub async fn superseded_matching(
        &self,
        thread_id: Uuid,
        query_text: &str,
        limit: i64,
    ) -> Result<Vec<MemoryItem>, MnemoError> {
        Ok(sqlx::query_as::<_, MemoryItem>(
            "SELECT * FROM memory_items
             WHERE thread_id = $1 AND status = 'superseded' AND statement_tsv @@ plainto_tsquery('english', $2)
             ORDER BY updated_at DESC LIMIT $3",
        )
        .bind(thread_id)
        .bind(query_text)
        .bind(limit)
        .fetch_all(self.pool())
        .await?)
    }

    pub async fn list_active_by_thread(&self, thread_id: Uuid) -> Result<Vec<MemoryItem>, MnemoError> {
        Ok(sqlx::query_as::<_, MemoryItem>(
            "SELECT * FROM memory_items WHERE thread_id = $1 AND status = 'active'
             ORDER BY importance DESC, updated_at DESC",
        )
        .bind(thread_id)
        .fetch_all(self.pool())
        .await?)
    }

    pub async fn list_active_and_superseded_by_thread(
        &self,
        thread_id: Uuid,
    ) -> Result<Vec<MemoryItem>, MnemoError> {
        Ok(sqlx::query_as::<_, MemoryItem>(
            "SELECT * FROM memory_items WHERE thread_id = $1 AND status IN ('active', 'superseded')
             ORDER BY updated_at DESC",
        )
        .bind(thread_id)
        .fetch_all(self.pool())
        .await?)
    }

    pub async fn list_active_by_types(
        &self,
        thread_id: Uuid,
        types: &[MemoryItemType],
    ) -> Result<Vec<MemoryItem>, MnemoError> {
        Ok(sqlx::query_as::<_, MemoryItem>(
            "SELECT * FROM memory_items WHERE thread_id = $1 AND status = 'active' AND item_type = ANY($2)",
        )
        .bind(thread_id)
        .bind(types)
        .fetch_all(self.pool())
        .await?)
    }

    pub async fn delete_memory_items_before(&self, cutoff: DateTime<Utc>) -> Result<u64, MnemoError> {
        let result = sqlx::query("DELETE FROM memory_items WHERE updated_at < $1")
            .bind(cutoff)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
