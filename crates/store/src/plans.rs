use chrono::Utc;
use mnemo_core::{MnemoError, Plan, PlanStatus};
use uuid::Uuid;

use crate::Store;

impl Store {
    pub async fn create_plan(
        &self,
        name: &str,
        metadata: serde_json::Value,
    ) -> Result<Plan, MnemoError> {
        let now = Utc::now();
        let plan = Plan {
            id: Uuid::new_v4(),
            name: name.to_string(),
            status: PlanStatus::Active,
            created_at: now,
            updated_at: now,
            metadata,
        };
        sqlx::query(
            "INSERT INTO plans (id, name, status, created_at, updated_at, metadata) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(plan.id)
        .bind(&plan.name)
        .bind(plan.status)
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .bind(&plan.metadata)
        .execute(self.pool())
        .await?;
        Ok(plan)
    }

    pub async fn get_plan(&self, id: Uuid) -> Result<Plan, MnemoError> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| MnemoError::NotFound(format!("plan {id}")))
    }

    pub async fn list_plans(&self) -> Result<Vec<Plan>, MnemoError> {
        Ok(
            sqlx::query_as::<_, Plan>("SELECT * FROM plans ORDER BY created_at DESC")
                .fetch_all(self.pool())
                .await?,
        )
    }

    pub async fn rename_plan(&self, id: Uuid, name: &str) -> Result<Plan, MnemoError> {
        let plan = sqlx::query_as::<_, Plan>(
            "UPDATE plans SET name = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| MnemoError::NotFound(format!("plan {id}")))?;
        Ok(plan)
    }

    pub async fn archive_plan(&self, id: Uuid) -> Result<Plan, MnemoError> {
        let plan = sqlx::query_as::<_, Plan>(
            "UPDATE plans SET status = 'archived', updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| MnemoError::NotFound(format!("plan {id}")))?;
        Ok(plan)
    }

    pub async fn touch_plan(&self, id: Uuid) -> Result<Plan, MnemoError> {
        let plan = sqlx::query_as::<_, Plan>(
            "UPDATE plans SET updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| MnemoError::NotFound(format!("plan {id}")))?;
        Ok(plan)
    }
}
