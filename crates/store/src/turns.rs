use chrono::{DateTime, Utc};
use mnemo_core::{MnemoError, Turn};
use uuid::Uuid;

use crate::Store;

#[derive(sqlx::FromRow)]
struct TurnDistanceRow {
    #[sqlx(flatten)]
    turn: Turn,
    distance: f64,
}

/// Postgres error code `23505` is `unique_violation`.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

impl Store {
    /// Idempotent on `(thread_id, external_turn_id)`: if a turn with that
    /// pair already exists, it is returned unchanged rather than inserted
    /// again. Returns `(turn, was_inserted)`.
    ///
    /// The initial check is a plain SELECT, which leaves a window for two
    /// concurrent ingests of the same pair to both reach the INSERT; the
    /// `UNIQUE(thread_id, external_turn_id)` constraint lets only one of
    /// them through, and the loser's unique-violation is caught and
    /// resolved to the winner's row rather than bubbling up.
    pub async fn insert_turn_idempotent(
        &self,
        thread_id: Uuid,
        role: &str,
        text: &str,
        ts: Option<DateTime<Utc>>,
        branch_id: Option<&str>,
        external_turn_id: Option<&str>,
    ) -> Result<(Turn, bool), MnemoError> {
        if let Some(external_id) = external_turn_id {
            if let Some(existing) = self.find_turn_by_external_id(thread_id, external_id).await? {
                return Ok((existing, false));
            }
        }

        let id = Uuid::new_v4();
        let ts = ts.unwrap_or_else(Utc::now);
        let insert = sqlx::query_as::<_, Turn>(
            "INSERT INTO turns (id, thread_id, role, text, ts, branch_id, external_turn_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(id)
        .bind(thread_id)
        .bind(role)
        .bind(text)
        .bind(ts)
        .bind(branch_id)
        .bind(external_turn_id)
        .fetch_one(self.pool())
        .await;

        match insert {
            Ok(turn) => Ok((turn, true)),
            Err(err) if is_unique_violation(&err) => {
                let external_id = external_turn_id
                    .expect("unique violation can only fire against (thread_id, external_turn_id)");
                let conflict = MnemoError::Conflict(format!(
                    "turn with external_turn_id '{external_id}' already exists for thread {thread_id}"
                ));
                tracing::debug!(%conflict, "turn ingest race resolved to the winning row");
                self.find_turn_by_external_id(thread_id, external_id)
                    .await?
                    .ok_or_else(|| MnemoError::NotFound(format!("turn for thread {thread_id}")))
                    .map(|turn| (turn, false))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_turn_by_external_id(
        &self,
        thread_id: Uuid,
        external_id: &str,
    ) -> Result<Option<Turn>, MnemoError> {
        Ok(sqlx::query_as::<_, Turn>(
            "SELECT * FROM turns WHERE thread_id = $1 AND external_turn_id = $2",
        )
        .bind(thread_id)
        .bind(external_id)
        .fetch_optional(self.pool())
        .await?)
    }

    pub async fn get_turn(&self, id: Uuid) -> Result<Turn, MnemoError> {
        sqlx::query_as::<_, Turn>("SELECT * FROM turns WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| MnemoError::NotFound(format!("turn {id}")))
    }

    pub async fn set_turn_embedding(&self, id: Uuid, embedding: Vec<f32>) -> Result<(), MnemoError> {
        sqlx::query("UPDATE turns SET embedding = $2 WHERE id = $1")
            .bind(id)
            .bind(pgvector::Vector::from(embedding))
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn recent_turns(&self, thread_id: Uuid, limit: i64) -> Result<Vec<Turn>, MnemoError> {
        Ok(sqlx::query_as::<_, Turn>(
            "SELECT * FROM turns WHERE thread_id = $1 ORDER BY ts DESC LIMIT $2",
        )
        .bind(thread_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?)
    }

    pub async fn vector_candidate_turns(
        &self,
        thread_id: Uuid,
        query_embedding: &[f32],
        limit: i64,
    ) -> Result<Vec<(Turn, f64)>, MnemoError> {
        let rows: Vec<TurnDistanceRow> = sqlx::query_as(
            "SELECT t.*, (t.embedding <=> $2) AS distance FROM turns t
             WHERE t.thread_id = $1 AND t.embedding IS NOT NULL
             ORDER BY t.embedding <=> $2 ASC LIMIT $3",
        )
        .bind(thread_id)
        .bind(pgvector::Vector::from(query_embedding.to_vec()))
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|row| (row.turn, row.distance)).collect())
    }

    pub async fn keyword_candidate_turns(
        &self,
        thread_id: Uuid,
        query_text: &str,
        limit: i64,
    ) -> Result<Vec<Turn>, MnemoError> {
        Ok(sqlx::query_as::<_, Turn>(
            "SELECT * FROM turns WHERE thread_id = $1 AND text_tsv @@ plainto_tsquery('english', $2)
             ORDER BY ts DESC LIMIT $3",
        )
        .bind(thread_id)
        .bind(query_text)
        .bind(limit)
        .fetch_all(self.pool())
        .await?)
    }

    /// Delete turns older than `cutoff` by `ts`, across all threads. Callers
    /// must treat a zero-or-negative retention window as "no cleanup" and
    /// never call this in that case.
    pub async fn delete_turns_before(&self, cutoff: DateTime<Utc>) -> Result<u64, MnemoError> {
        let result = sqlx::query("DELETE FROM turns WHERE ts < $1")
            .bind(cutoff)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
