use chrono::{DateTime, Utc};
use mnemo_core::{Job, JobType, MnemoError};
use uuid::Uuid;

use crate::Store;

impl Store {
    pub async fn enqueue_job(
        &self,
        job_type: JobType,
        payload: serde_json::Value,
        run_at: Option<DateTime<Utc>>,
    ) -> Result<Job, MnemoError> {
        let id = Uuid::new_v4();
        let run_at = run_at.unwrap_or_else(Utc::now);
        let job = sqlx::query_as::<_, Job>(
            "INSERT INTO jobs (id, job_type, status, payload, run_at, attempts)
             VALUES ($1, $2, 'pending', $3, $4, 0) RETURNING *",
        )
        .bind(id)
        .bind(job_type)
        .bind(&payload)
        .bind(run_at)
        .fetch_one(self.pool())
        .await?;
        Ok(job)
    }

    /// Atomically claim the earliest due pending job and mark it running.
    /// `SELECT ... FOR UPDATE SKIP LOCKED` ensures concurrent workers never
    /// observe and claim the same row.
    pub async fn fetch_next_job(&self) -> Result<Option<Job>, MnemoError> {
        let mut tx = self.pool().begin().await?;
        let job = sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs
             WHERE status = 'pending' AND run_at <= now()
             ORDER BY run_at ASC
             FOR UPDATE SKIP LOCKED
             LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let job = match job {
            Some(job) => job,
            None => {
                tx.commit().await?;
                return Ok(None);
            }
        };

        let claimed = sqlx::query_as::<_, Job>(
            "UPDATE jobs SET status = 'running', updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(job.id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Some(claimed))
    }

    pub async fn complete_job(&self, id: Uuid) -> Result<(), MnemoError> {
        sqlx::query("UPDATE jobs SET status = 'done', updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// `attempts += 1`; terminal `failed` at `max_attempts`, otherwise back
    /// to `pending` with exponential backoff `2^attempts` seconds out.
    pub async fn fail_job(&self, id: Uuid, error: &str, max_attempts: u32) -> Result<Job, MnemoError> {
        let job = sqlx::query_as::<_, Job>(
            "UPDATE jobs
             SET attempts = attempts + 1,
                 last_error = $2,
                 status = CASE WHEN attempts + 1 >= $3 THEN 'failed' ELSE 'pending' END,
                 run_at = CASE WHEN attempts + 1 >= $3 THEN run_at
                          ELSE now() + (power(2, attempts + 1) * interval '1 second')
                          END,
                 updated_at = now()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(error)
        .bind(max_attempts as i32)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| MnemoError::NotFound(format!("job {id}")))?;
        Ok(job)
    }

    pub async fn get_job(&self, id: Uuid) -> Result<Job, MnemoError> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| MnemoError::NotFound(format!("job {id}")))
    }
}
