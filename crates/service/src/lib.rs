//! The runtime object that owns one instance of every core component and
//! exposes the tool-dispatch operations as plain async methods. This is what
//! `mnemo-rpc` and `mnemo-daemon` call — no hidden singletons, everything
//! lives on `Runtime` and is wired once at start-up.

mod decision_state;

pub use decision_state::DecisionState;

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use mnemo_config::AppConfig;
use mnemo_core::{Metrics, MnemoError, Plan, Thread};
use mnemo_jobs::{JobEngine, JobEngineConfig, RetentionConfig};
use mnemo_lifecycle::{DedupConfig, IngestConfig, LifecycleEngine, MemoryItemPayload};
use mnemo_llm::{LlmMediator, MediatorConfig};
use mnemo_retrieval::{AuditResult, ExportResult, ImportResult, RetrievalConfig, RetrievalEngine, RetrievalMode, RetrievalScope, RetrieveResult};
use mnemo_store::{Store, VectorIndexKind};

#[derive(Clone)]
pub struct Runtime {
    pub store: Store,
    pub llm: Arc<LlmMediator>,
    pub metrics: Arc<Metrics>,
    pub lifecycle: LifecycleEngine,
    pub retrieval: RetrievalEngine,
    pub jobs: JobEngine,
}

impl Runtime {
    /// Connect, migrate, and wire every component from one loaded
    /// [`AppConfig`]. Called once at process start-up by `mnemo-daemon`.
    pub async fn bootstrap(config: &AppConfig) -> anyhow::Result<Self> {
        let store = Store::connect(&config.database.url).await?;

        let vector_kind = match config.vector.index_kind {
            mnemo_config::VectorIndexKind::Auto => VectorIndexKind::Auto,
            mnemo_config::VectorIndexKind::Hnsw => VectorIndexKind::Hnsw,
            mnemo_config::VectorIndexKind::IvfFlat => VectorIndexKind::IvfFlat,
        };
        store.migrate(vector_kind).await?;

        let metrics = Arc::new(Metrics::new());

        let llm_config = MediatorConfig {
            base_url: config.llm.base_url.clone(),
            embed_model: config.llm.embed_model.clone(),
            chat_model: config.llm.chat_model.clone(),
            max_concurrency: config.llm.max_concurrency,
            max_failures: config.llm.max_failures,
            breaker_ttl: Duration::from_secs(config.llm.breaker_ttl_s),
            retry_attempts: config.llm.retry_attempts,
            timeout: Duration::from_secs(config.llm.timeout_s),
            embedding_dim: config.llm.embedding_dim,
            fake_mode: config.llm.fake_mode,
            cache_capacity: config.cache.capacity,
            cache_ttl: Duration::from_secs(config.cache.ttl_s),
        };
        let llm = Arc::new(LlmMediator::new(llm_config, metrics.clone()));

        let dedup = DedupConfig {
            dedup_sim_threshold: config.dedup.sim_threshold,
            supersede_sim_threshold: config.dedup.supersede_sim_threshold,
            supersede_guard_min: config.dedup.supersede_guard_min,
        };
        let ingest = IngestConfig {
            embed_sync: config.ingest.embed_sync,
            auto_distill: config.ingest.auto_distill_on_ingest,
        };
        let lifecycle = LifecycleEngine::new(store.clone(), llm.clone(), dedup, ingest, metrics.clone());

        let retrieval_config = RetrievalConfig {
            default_top_k: config.retrieval.default_top_k,
            recency_bias: config.retrieval.recency_bias,
            enable_llm_rerank: config.retrieval.enable_llm_rerank,
            hmac_secret: config.shared.hmac_secret.clone(),
        };
        let retrieval = RetrievalEngine::new(store.clone(), llm.clone(), metrics.clone(), retrieval_config);

        let job_config = JobEngineConfig {
            poll_interval: Duration::from_secs(config.job.poll_interval_s),
            max_attempts: config.job.max_attempts,
        };
        let retention = RetentionConfig {
            days_turns: config.retention.days_turns,
            days_memory: config.retention.days_memory,
            cleanup_interval: Duration::from_secs(config.retention.cleanup_interval_s),
        };
        let jobs = JobEngine::new(store.clone(), llm.clone(), lifecycle.clone(), job_config, retention, metrics.clone());

        Ok(Self { store, llm, metrics, lifecycle, retrieval, jobs })
    }

    // ── Plans ──────────────────────────────────────────────────────────

    pub async fn create_plan(&self, name: &str, metadata: serde_json::Value) -> Result<Plan, MnemoError> {
        self.store.create_plan(name, metadata).await
    }

    pub async fn list_plans(&self) -> Result<Vec<Plan>, MnemoError> {
        self.store.list_plans().await
    }

    pub async fn get_plan(&self, id: Uuid) -> Result<Plan, MnemoError> {
        self.store.get_plan(id).await
    }

    pub async fn rename_plan(&self, id: Uuid, name: &str) -> Result<Plan, MnemoError> {
        self.store.rename_plan(id, name).await
    }

    pub async fn archive_plan(&self, id: Uuid) -> Result<Plan, MnemoError> {
        self.store.archive_plan(id).await
    }

    pub async fn touch_plan(&self, id: Uuid) -> Result<Plan, MnemoError> {
        self.store.touch_plan(id).await
    }

    // ── Threads / turns ────────────────────────────────────────────────

    pub async fn create_thread(&self, plan_id: Uuid, metadata: serde_json::Value) -> Result<Thread, MnemoError> {
        self.store.create_thread(plan_id, metadata).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn ingest_turn(
        &self,
        thread_id: Uuid,
        role: &str,
        text: &str,
        ts: Option<chrono::DateTime<chrono::Utc>>,
        branch_id: Option<&str>,
        external_turn_id: Option<&str>,
        embed_now: bool,
    ) -> Result<mnemo_core::Turn, MnemoError> {
        self.lifecycle
            .ingest_turn(thread_id, role, text, ts, branch_id, external_turn_id, embed_now)
            .await
    }

    // ── Distill ────────────────────────────────────────────────────────

    pub async fn distill_extract(
        &self,
        thread_id: Uuid,
        turn_id: Uuid,
        include_recent: i64,
        write_to_memory: bool,
    ) -> Result<mnemo_lifecycle::DistillResult, MnemoError> {
        self.lifecycle.distill_extract(thread_id, turn_id, include_recent, write_to_memory).await
    }

    // ── Retrieval ──────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub async fn retrieve_context(
        &self,
        thread_id: Uuid,
        query: &str,
        mode: RetrievalMode,
        scope: RetrievalScope,
        top_k: usize,
        token_budget: usize,
        recency_bias: Option<f32>,
        explain: bool,
    ) -> Result<RetrieveResult, MnemoError> {
        self.retrieval
            .retrieve_context(thread_id, query, mode, scope, top_k, token_budget, recency_bias, explain)
            .await
    }

    pub async fn retrieve_decision_state(&self, thread_id: Uuid) -> Result<DecisionState, MnemoError> {
        decision_state::build(&self.store, thread_id).await
    }

    // ── Audit ──────────────────────────────────────────────────────────

    pub async fn audit_check_consistency(&self, thread_id: Uuid, plan_text: &str, deep: bool) -> Result<AuditResult, MnemoError> {
        self.retrieval.audit_consistency(thread_id, plan_text, deep).await
    }

    // ── Memory admin ───────────────────────────────────────────────────

    pub async fn memory_upsert(
        &self,
        thread_id: Uuid,
        item_type: mnemo_core::MemoryItemType,
        payload: MemoryItemPayload,
        evidence_turn_ids: Vec<Uuid>,
    ) -> Result<(mnemo_core::MemoryItem, mnemo_lifecycle::UpsertOutcome), MnemoError> {
        self.lifecycle.upsert_memory_item(thread_id, item_type, payload, evidence_turn_ids).await
    }

    pub async fn memory_deprecate(&self, item_id: Uuid, reason: &str) -> Result<mnemo_core::MemoryItem, MnemoError> {
        self.lifecycle.deprecate(item_id, reason).await
    }

    pub async fn memory_supersede(
        &self,
        old_item_id: Uuid,
        new_payload: MemoryItemPayload,
        reason: &str,
    ) -> Result<mnemo_core::MemoryItem, MnemoError> {
        self.lifecycle.supersede(old_item_id, new_payload, reason).await
    }

    pub async fn score_override(
        &self,
        item_id: Uuid,
        importance: Option<f32>,
        confidence: Option<f32>,
        severity: Option<f32>,
        reason: &str,
    ) -> Result<mnemo_core::MemoryItem, MnemoError> {
        self.lifecycle.override_scores(item_id, importance, confidence, severity, reason).await
    }

    // ── Shared export/import ───────────────────────────────────────────

    pub async fn shared_export(
        &self,
        thread_id: Uuid,
        types: &[mnemo_core::MemoryItemType],
        include_mistakes: bool,
        ttl_s: i64,
    ) -> Result<ExportResult, MnemoError> {
        self.retrieval.shared_export(thread_id, types, include_mistakes, ttl_s).await
    }

    pub async fn shared_import(&self, plan_id: Uuid, payload: serde_json::Value, signature: &str) -> Result<ImportResult, MnemoError> {
        self.retrieval.shared_import(plan_id, payload, signature).await
    }

    // ── Health / observability ─────────────────────────────────────────

    pub async fn health_check(&self) -> Result<(), MnemoError> {
        self.store.health_check().await
    }

    pub fn metrics_snapshot(&self) -> std::collections::HashMap<String, u64> {
        self.metrics.snapshot()
    }
}
