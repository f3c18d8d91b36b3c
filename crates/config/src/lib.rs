//! Environment-variable configuration.
//!
//! Every knob is read once at start-up into [`AppConfig`], grouped into the
//! per-concern structs the rest of the workspace borrows from. Prefixes
//! match the spec's environment grouping: `database_url`, `llm_*`, `dedup_*`,
//! `retention_*`, `vector_*`, `job_*`, `cache_*`, plus a `retrieval_*` prefix
//! for retrieval knobs that don't fit the `vector_*` bucket (documented in
//! DESIGN.md).

use std::env;

use anyhow::Result;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/mnemo".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub embed_model: String,
    pub chat_model: String,
    pub max_concurrency: usize,
    pub max_failures: u32,
    pub breaker_ttl_s: u64,
    pub retry_attempts: u32,
    pub timeout_s: u64,
    pub embedding_dim: usize,
    pub fake_mode: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            chat_model: "llama3.1:8b".to_string(),
            max_concurrency: 4,
            max_failures: 3,
            breaker_ttl_s: 30,
            retry_attempts: 3,
            timeout_s: 30,
            embedding_dim: 32,
            fake_mode: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl_s: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            ttl_s: 3600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DedupConfig {
    pub sim_threshold: f32,
    pub supersede_sim_threshold: f32,
    pub supersede_guard_min: f32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            sim_threshold: 0.9,
            supersede_sim_threshold: 0.8,
            supersede_guard_min: 0.75,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub days_turns: i64,
    pub days_memory: i64,
    pub cleanup_interval_s: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days_turns: 0,
            days_memory: 0,
            cleanup_interval_s: 3600,
        }
    }
}

/// Turn-ingestion scheduling knobs.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub embed_sync: bool,
    pub auto_distill_on_ingest: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            embed_sync: false,
            auto_distill_on_ingest: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobConfig {
    pub poll_interval_s: u64,
    pub max_attempts: u32,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            poll_interval_s: 2,
            max_attempts: 5,
        }
    }
}

/// `auto` probes for HNSW opclass availability and falls back to IVF-Flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorIndexKind {
    Auto,
    Hnsw,
    IvfFlat,
}

#[derive(Debug, Clone)]
pub struct VectorConfig {
    pub index_kind: VectorIndexKind,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            index_kind: VectorIndexKind::Auto,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub recency_bias: f32,
    pub enable_llm_rerank: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 8,
            recency_bias: 1.0,
            enable_llm_rerank: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SharedConfig {
    pub hmac_secret: Option<String>,
    pub default_ttl_s: i64,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            hmac_secret: None,
            default_ttl_s: 7 * 24 * 3600,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub cache: CacheConfig,
    pub dedup: DedupConfig,
    pub retention: RetentionConfig,
    pub job: JobConfig,
    pub vector: VectorConfig,
    pub retrieval: RetrievalConfig,
    pub shared: SharedConfig,
    pub ingest: IngestConfig,
}

impl AppConfig {
    /// Load from the process environment, applying a local `.env` file first
    /// when present. Every field falls back to its documented default when
    /// the variable is unset or fails to parse.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Some(v) = env_str("DATABASE_URL") {
            config.database.url = v;
        }

        if let Some(v) = env_str("LLM_BASE_URL") {
            config.llm.base_url = v;
        }
        if let Some(v) = env_str("LLM_EMBED_MODEL") {
            config.llm.embed_model = v;
        }
        if let Some(v) = env_str("LLM_CHAT_MODEL") {
            config.llm.chat_model = v;
        }
        env_parsed("LLM_MAX_CONCURRENCY", &mut config.llm.max_concurrency);
        env_parsed("LLM_MAX_FAILURES", &mut config.llm.max_failures);
        env_parsed("LLM_BREAKER_TTL_S", &mut config.llm.breaker_ttl_s);
        env_parsed("LLM_RETRY_ATTEMPTS", &mut config.llm.retry_attempts);
        env_parsed("LLM_TIMEOUT_S", &mut config.llm.timeout_s);
        env_parsed("LLM_EMBEDDING_DIM", &mut config.llm.embedding_dim);
        env_parsed("LLM_FAKE_MODE", &mut config.llm.fake_mode);

        env_parsed("CACHE_CAPACITY", &mut config.cache.capacity);
        env_parsed("CACHE_TTL_S", &mut config.cache.ttl_s);

        env_parsed("DEDUP_SIM_THRESHOLD", &mut config.dedup.sim_threshold);
        env_parsed(
            "DEDUP_SUPERSEDE_SIM_THRESHOLD",
            &mut config.dedup.supersede_sim_threshold,
        );
        env_parsed(
            "DEDUP_SUPERSEDE_GUARD_MIN",
            &mut config.dedup.supersede_guard_min,
        );

        env_parsed("RETENTION_DAYS_TURNS", &mut config.retention.days_turns);
        env_parsed("RETENTION_DAYS_MEMORY", &mut config.retention.days_memory);
        env_parsed(
            "RETENTION_CLEANUP_INTERVAL_S",
            &mut config.retention.cleanup_interval_s,
        );

        env_parsed("JOB_POLL_INTERVAL_S", &mut config.job.poll_interval_s);
        env_parsed("JOB_MAX_ATTEMPTS", &mut config.job.max_attempts);

        if let Some(v) = env_str("VECTOR_INDEX_KIND") {
            config.vector.index_kind = match v.to_ascii_lowercase().as_str() {
                "hnsw" => VectorIndexKind::Hnsw,
                "ivfflat" | "ivf_flat" => VectorIndexKind::IvfFlat,
                _ => VectorIndexKind::Auto,
            };
        }

        env_parsed("RETRIEVAL_DEFAULT_TOP_K", &mut config.retrieval.default_top_k);
        env_parsed("RETRIEVAL_RECENCY_BIAS", &mut config.retrieval.recency_bias);
        env_parsed(
            "RETRIEVAL_ENABLE_LLM_RERANK",
            &mut config.retrieval.enable_llm_rerank,
        );

        if let Some(v) = env_str("SHARED_HMAC_SECRET") {
            config.shared.hmac_secret = Some(v);
        }
        env_parsed("SHARED_DEFAULT_TTL_S", &mut config.shared.default_ttl_s);

        env_parsed("INGEST_EMBED_SYNC", &mut config.ingest.embed_sync);
        env_parsed("AUTO_DISTILL_ON_INGEST", &mut config.ingest.auto_distill_on_ingest);

        Ok(config)
    }

    /// Same as [`Self::load`] but fails loudly when `database_url` is unset,
    /// for entry points (the daemon binary) that cannot run without one.
    pub fn load_requiring_database(&self) -> Result<&str> {
        if self.database.url.is_empty() {
            anyhow::bail!("DATABASE_URL must be set");
        }
        Ok(&self.database.url)
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str, slot: &mut T) {
    if let Some(raw) = env_str(key) {
        match raw.parse::<T>() {
            Ok(parsed) => *slot = parsed,
            Err(_) => {
                tracing::warn!(key, raw, "failed to parse environment variable, keeping default");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() -> Result<()> {
        let config = AppConfig::default();
        assert_eq!(config.dedup.sim_threshold, 0.9);
        assert_eq!(config.job.max_attempts, 5);
        assert!(!config.llm.fake_mode);
        Ok(())
    }

    #[test]
    fn env_parsed_ignores_malformed_values_and_keeps_default() {
        let mut capacity = 1024usize;
        unsafe {
            env::set_var("CACHE_CAPACITY", "not-a-number");
        }
        env_parsed("CACHE_CAPACITY", &mut capacity);
        assert_eq!(capacity, 1024);
        unsafe {
            env::remove_var("CACHE_CAPACITY");
        }
    }

    #[test]
    fn env_parsed_applies_valid_override() {
        let mut ttl = 3600u64;
        unsafe {
            env::set_var("CACHE_TTL_S", "60");
        }
        env_parsed("CACHE_TTL_S", &mut ttl);
        assert_eq!(ttl, 60);
        unsafe {
            env::remove_var("CACHE_TTL_S");
        }
    }
}
