use mnemo_core::{MnemoError, Thread};
use uuid::Uuid;

use crate::Store;

impl Store {
    pub async fn create_thread(
        &self,
        plan_id: Uuid,
        metadata: serde_json::Value,
    ) -> Result<Thread, MnemoError> {
        let id = Uuid::new_v4();
        let thread = sqlx::query_as::<_, Thread>(
            "INSERT INTO threads (id, plan_id, metadata) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(id)
        .bind(plan_id)
        .bind(metadata)
        .fetch_one(self.pool())
        .await?;
        Ok(thread)
    }

    pub async fn get_thread(&self, id: Uuid) -> Result<Thread, MnemoError> {
        sqlx::query_as::<_, Thread>("SELECT * FROM threads WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| MnemoError::NotFound(format!("thread {id}")))
    }

    pub async fn touch_thread(&self, id: Uuid) -> Result<(), MnemoError> {
        sqlx::query("UPDATE threads SET updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
