//! Typed Postgres access: one method per store operation the rest of the
//! workspace needs, plus the vector-index bootstrap and migration runner.
//!
//! Every query here uses the runtime-checked `sqlx::query`/`query_as` forms
//! rather than the `query!` compile-time macros, since the latter require a
//! live database at build time.

mod jobs;
mod memory_items;
mod plans;
mod shared_packages;
mod threads;
mod turns;
mod vector_index;

pub use vector_index::VectorIndexKind;

use mnemo_core::MnemoError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self, MnemoError> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Run pending migrations and ensure the configured vector index kind
    /// exists, falling back to IVF-Flat when HNSW is unavailable.
    pub async fn migrate(&self, vector_index_kind: VectorIndexKind) -> Result<(), MnemoError> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|err| MnemoError::Store(sqlx::Error::Migrate(Box::new(err))))?;
        vector_index::ensure_vector_indices(&self.pool, vector_index_kind).await
    }

    /// Liveness probe: `SELECT 1`.
    pub async fn health_check(&self) -> Result<(), MnemoError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
