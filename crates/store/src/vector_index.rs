use mnemo_core::MnemoError;
use sqlx::PgPool;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorIndexKind {
    Auto,
    Hnsw,
    IvfFlat,
}

/// Build the vector index for `turns.embedding` and `memory_items.embedding`.
/// `Auto` tries HNSW first and falls back to IVF-Flat if the extension
/// build doesn't carry HNSW opclasses (pre-0.5.0 pgvector).
pub(crate) async fn ensure_vector_indices(
    pool: &PgPool,
    kind: VectorIndexKind,
) -> Result<(), MnemoError> {
    let want_hnsw = match kind {
        VectorIndexKind::Hnsw => true,
        VectorIndexKind::IvfFlat => false,
        VectorIndexKind::Auto => true,
    };

    if want_hnsw {
        let hnsw_ok = try_create_index(pool, "hnsw").await;
        if hnsw_ok || kind == VectorIndexKind::Hnsw {
            return if hnsw_ok {
                Ok(())
            } else {
                Err(MnemoError::Validation(
                    "HNSW vector index unavailable and vector_index_kind=hnsw was forced".to_string(),
                ))
            };
        }
        warn!("HNSW vector index unavailable, falling back to IVF-Flat");
    }

    if try_create_index(pool, "ivfflat").await {
        Ok(())
    } else {
        Err(MnemoError::Validation(
            "neither HNSW nor IVF-Flat vector indices could be created".to_string(),
        ))
    }
}

async fn try_create_index(pool: &PgPool, method: &str) -> bool {
    let turns_sql = format!(
        "CREATE INDEX IF NOT EXISTS idx_turns_embedding ON turns USING {method} (embedding vector_cosine_ops)"
    );
    let memory_sql = format!(
        "CREATE INDEX IF NOT EXISTS idx_memory_items_embedding ON memory_items USING {method} (embedding vector_cosine_ops)"
    );

    let turns_ok = sqlx::query(&turns_sql).execute(pool).await.is_ok();
    let memory_ok = sqlx::query(&memory_sql).execute(pool).await.is_ok();

    if turns_ok && memory_ok {
        info!(method, "vector indices ready");
        true
    } else {
        false
    }
}
