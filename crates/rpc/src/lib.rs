//! The tool-dispatch façade: one entry point that takes `{tool,
//! arguments}` and routes it to the matching [`mnemo_service::Runtime`]
//! method, recording per-tool latency/call counters along the way.
//!
//! This crate intentionally knows nothing about transport — the Unix-socket
//! listener lives in `mnemo-daemon` and calls [`Dispatcher::dispatch`] per
//! received line.

mod args;

use std::time::Instant;

use serde_json::{json, Value};

use mnemo_core::MnemoError;
use mnemo_lifecycle::MemoryItemPayload;
use mnemo_retrieval::{RetrievalMode, RetrievalScope};
use mnemo_service::Runtime;

pub struct Dispatcher {
    runtime: Runtime,
}

impl Dispatcher {
    pub fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }

    /// Routes `tool` to its handler. Unknown tool names are the dispatch
    /// layer's own 404-equivalent, not a [`MnemoError::NotFound`] about an
    /// entity — kept distinct so callers can tell "no such tool" from "no
    /// such row".
    pub async fn dispatch(&self, tool: &str, arguments: Value) -> Result<Value, MnemoError> {
        let start = Instant::now();
        let result = self.route(tool, arguments).await;

        let metrics = &self.runtime.metrics;
        metrics.incr(&format!("rpc.{tool}.calls"));
        metrics.incr_by(&format!("rpc.{tool}.latency_ms_total"), start.elapsed().as_millis() as u64);
        if result.is_err() {
            metrics.incr(&format!("rpc.{tool}.errors"));
        }

        result
    }

    async fn route(&self, tool: &str, a: Value) -> Result<Value, MnemoError> {
        match tool {
            "thread.create" => self.thread_create(&a).await,
            "turn.ingest" => self.turn_ingest(&a).await,
            "plan.create" => self.plan_create(&a).await,
            "plan.list" => self.plan_list().await,
            "plan.get" => self.plan_get(&a).await,
            "plan.rename" => self.plan_rename(&a).await,
            "plan.archive" => self.plan_archive(&a).await,
            "plan.touch" => self.plan_touch(&a).await,
            "distill.extract" => self.distill_extract(&a).await,
            "retrieve.decision_state" => self.retrieve_decision_state(&a).await,
            "retrieve.context" => self.retrieve_context(&a).await,
            "audit.check_consistency" => self.audit_check_consistency(&a).await,
            "memory.deprecate" => self.memory_deprecate(&a).await,
            "memory.supersede" => self.memory_supersede(&a).await,
            "score.override" => self.score_override(&a).await,
            "shared.export" => self.shared_export(&a).await,
            "shared.import" => self.shared_import(&a).await,
            "health.check" => self.health_check().await,
            other => Err(MnemoError::NotFound(format!("unknown tool '{other}'"))),
        }
    }

    async fn thread_create(&self, a: &Value) -> Result<Value, MnemoError> {
        let plan_id = args::uuid_field(a, "plan_id")?;
        let meta = args::metadata_field(a, "meta");
        let thread = self.runtime.create_thread(plan_id, meta).await?;
        Ok(json!({ "thread_id": thread.id }))
    }

    async fn turn_ingest(&self, a: &Value) -> Result<Value, MnemoError> {
        let thread_id = args::uuid_field(a, "thread_id")?;
        let role = args::str_field(a, "role")?;
        let text = args::str_field(a, "text")?;
        let ts = args::timestamp_field(a, "ts");
        let branch_id = args::opt_str_field(a, "branch_id");
        let external_turn_id = args::opt_str_field(a, "external_turn_id");
        let embed_now = args::bool_field(a, "embed_now", false);
        let turn = self
            .runtime
            .ingest_turn(thread_id, role, text, ts, branch_id, external_turn_id, embed_now)
            .await?;
        Ok(json!({ "turn_id": turn.id }))
    }

    async fn plan_create(&self, a: &Value) -> Result<Value, MnemoError> {
        let name = args::str_field(a, "name")?;
        let meta = args::metadata_field(a, "meta");
        let plan = self.runtime.create_plan(name, meta).await?;
        Ok(serde_json::to_value(plan).expect("Plan serializes"))
    }

    async fn plan_list(&self) -> Result<Value, MnemoError> {
        let plans = self.runtime.list_plans().await?;
        Ok(serde_json::to_value(plans).expect("Vec<Plan> serializes"))
    }

    async fn plan_get(&self, a: &Value) -> Result<Value, MnemoError> {
        let id = args::uuid_field(a, "plan_id")?;
        let plan = self.runtime.get_plan(id).await?;
        Ok(serde_json::to_value(plan).expect("Plan serializes"))
    }

    async fn plan_rename(&self, a: &Value) -> Result<Value, MnemoError> {
        let id = args::uuid_field(a, "plan_id")?;
        let name = args::str_field(a, "name")?;
        let plan = self.runtime.rename_plan(id, name).await?;
        Ok(serde_json::to_value(plan).expect("Plan serializes"))
    }

    async fn plan_archive(&self, a: &Value) -> Result<Value, MnemoError> {
        let id = args::uuid_field(a, "plan_id")?;
        let plan = self.runtime.archive_plan(id).await?;
        Ok(serde_json::to_value(plan).expect("Plan serializes"))
    }

    async fn plan_touch(&self, a: &Value) -> Result<Value, MnemoError> {
        let id = args::uuid_field(a, "plan_id")?;
        let plan = self.runtime.touch_plan(id).await?;
        Ok(serde_json::to_value(plan).expect("Plan serializes"))
    }

    async fn distill_extract(&self, a: &Value) -> Result<Value, MnemoError> {
        let thread_id = args::uuid_field(a, "thread_id")?;
        let turn_id = args::uuid_field(a, "turn_id")?;
        let include_recent = args::i64_field(a, "include_recent_turns", 4);
        let write_to_memory = args::bool_field(a, "write_to_memory", true);
        let result = self.runtime.distill_extract(thread_id, turn_id, include_recent, write_to_memory).await?;
        Ok(json!({
            "inserted": result.counts.inserted,
            "deduped": result.counts.deduped,
            "superseded": result.counts.superseded,
            "extracted": result.extracted,
        }))
    }

    async fn retrieve_decision_state(&self, a: &Value) -> Result<Value, MnemoError> {
        let thread_id = args::uuid_field(a, "thread_id")?;
        let state = self.runtime.retrieve_decision_state(thread_id).await?;
        Ok(serde_json::to_value(state).expect("DecisionState serializes"))
    }

    async fn retrieve_context(&self, a: &Value) -> Result<Value, MnemoError> {
        let thread_id = args::uuid_field(a, "thread_id")?;
        let query = args::str_field(a, "query")?;
        let mode = RetrievalMode::parse(args::opt_str_field(a, "mode").unwrap_or("fast"));
        let scope = RetrievalScope::parse(args::opt_str_field(a, "scope").unwrap_or("distilled_only"));
        let top_k = args::usize_field(a, "top_k", 8);
        let token_budget = args::usize_field(a, "token_budget", 2000);
        let recency_bias = args::opt_f32_field(a, "recency_bias");
        let explain = args::bool_field(a, "explain", false);
        let result = self
            .runtime
            .retrieve_context(thread_id, query, mode, scope, top_k, token_budget, recency_bias, explain)
            .await?;
        Ok(serde_json::to_value(result).expect("RetrieveResult serializes"))
    }

    async fn audit_check_consistency(&self, a: &Value) -> Result<Value, MnemoError> {
        let thread_id = args::uuid_field(a, "thread_id")?;
        let plan_text = args::str_field(a, "proposed_plan_text")?;
        let deep = args::bool_field(a, "deep", false);
        let result = self.runtime.audit_check_consistency(thread_id, plan_text, deep).await?;
        Ok(serde_json::to_value(result).expect("AuditResult serializes"))
    }

    fn payload_from_args(a: &Value) -> Result<MemoryItemPayload, MnemoError> {
        Ok(MemoryItemPayload {
            title: args::str_field(a, "title")?.to_string(),
            statement: args::str_field(a, "statement")?.to_string(),
            importance: args::f32_field(a, "importance", 0.5),
            confidence: args::f32_field(a, "confidence", 0.5),
            severity: args::f32_field(a, "severity", 0.0),
            tags: args::string_list_field(a, "tags"),
            affects: args::string_list_field(a, "affects"),
            code_refs: args::string_list_field(a, "code_refs"),
        })
    }

    async fn memory_deprecate(&self, a: &Value) -> Result<Value, MnemoError> {
        let item_id = args::uuid_field(a, "item_id")?;
        let reason = args::str_field(a, "reason")?;
        let item = self.runtime.memory_deprecate(item_id, reason).await?;
        Ok(json!({ "item_id": item.id, "status": item.status }))
    }

    async fn memory_supersede(&self, a: &Value) -> Result<Value, MnemoError> {
        let old_item_id = args::uuid_field(a, "old_item_id")?;
        let reason = args::str_field(a, "reason")?;
        let payload = Self::payload_from_args(a)?;
        let item = self.runtime.memory_supersede(old_item_id, payload, reason).await?;
        Ok(json!({ "item_id": item.id, "status": item.status }))
    }

    async fn score_override(&self, a: &Value) -> Result<Value, MnemoError> {
        let item_id = args::uuid_field(a, "item_id")?;
        let reason = args::str_field(a, "reason")?;
        let importance = args::opt_f32_field(a, "importance");
        let confidence = args::opt_f32_field(a, "confidence");
        let severity = args::opt_f32_field(a, "severity");
        let item = self.runtime.score_override(item_id, importance, confidence, severity, reason).await?;
        Ok(json!({ "item_id": item.id, "status": item.status }))
    }

    async fn shared_export(&self, a: &Value) -> Result<Value, MnemoError> {
        let thread_id = args::uuid_field(a, "thread_id")?;
        let types = args::memory_item_type_list_field(a, "types")?;
        let include_mistakes = args::bool_field(a, "include_mistakes", false);
        let ttl_s = args::i64_field(a, "ttl_s", 7 * 24 * 3600);
        let result = self.runtime.shared_export(thread_id, &types, include_mistakes, ttl_s).await?;
        Ok(serde_json::to_value(result).expect("ExportResult serializes"))
    }

    async fn shared_import(&self, a: &Value) -> Result<Value, MnemoError> {
        let plan_id = args::uuid_field(a, "plan_id")?;
        let payload = a.get("payload").cloned().ok_or_else(|| MnemoError::Validation("missing required field 'payload'".to_string()))?;
        let signature = args::str_field(a, "signature")?;
        let result = self.runtime.shared_import(plan_id, payload, signature).await?;
        Ok(serde_json::to_value(result).expect("ImportResult serializes"))
    }

    async fn health_check(&self) -> Result<Value, MnemoError> {
        self.runtime.health_check().await?;
        Ok(json!({ "status": "ok" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tool_name_is_distinguishable_from_entity_not_found() {
        let err = MnemoError::NotFound("unknown tool 'bogus.tool'".to_string());
        assert!(matches!(err, MnemoError::NotFound(_)));
    }
}
