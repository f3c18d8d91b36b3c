use chrono::{DateTime, Utc};
use mnemo_core::{MnemoError, SharedPackage};
use uuid::Uuid;

use crate::Store;

impl Store {
    pub async fn insert_shared_package(
        &self,
        expires_at: DateTime<Utc>,
        payload: serde_json::Value,
        signature: &str,
        metadata: serde_json::Value,
    ) -> Result<SharedPackage, MnemoError> {
        let id = Uuid::new_v4();
        let package = sqlx::query_as::<_, SharedPackage>(
            "INSERT INTO shared_packages (id, expires_at, payload, signature, metadata)
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(id)
        .bind(expires_at)
        .bind(&payload)
        .bind(signature)
        .bind(&metadata)
        .fetch_one(self.pool())
        .await?;
        Ok(package)
    }

    pub async fn get_shared_package(&self, id: Uuid) -> Result<SharedPackage, MnemoError> {
        sqlx::query_as::<_, SharedPackage>("SELECT * FROM shared_packages WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| MnemoError::NotFound(format!("shared package {id}")))
    }
}
