//! The LLM client mediator: bounded concurrency, circuit breaker, retry,
//! response caching, and a deterministic fake mode for testability.
//!
//! Exposes exactly two operations callers need: [`LlmMediator::embed`] and
//! [`LlmMediator::chat_json`]. Everything else — the gate, the breaker, the
//! cache, the retry loop — is plumbing hidden behind those two calls.

mod breaker;
mod fake;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use mnemo_cache::TtlLruCache;
use mnemo_core::{MnemoError, Metrics};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use breaker::Breaker;

#[derive(Debug, Clone)]
pub struct MediatorConfig {
    pub base_url: String,
    pub embed_model: String,
    pub chat_model: String,
    pub max_concurrency: usize,
    pub max_failures: u32,
    pub breaker_ttl: Duration,
    pub retry_attempts: u32,
    pub timeout: Duration,
    pub embedding_dim: usize,
    pub fake_mode: bool,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
}

impl Default for MediatorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            chat_model: "llama3.1:8b".to_string(),
            max_concurrency: 4,
            max_failures: 3,
            breaker_ttl: Duration::from_secs(30),
            retry_attempts: 3,
            timeout: Duration::from_secs(30),
            embedding_dim: 32,
            fake_mode: false,
            cache_capacity: 1024,
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

pub struct LlmMediator {
    config: MediatorConfig,
    client: reqwest::Client,
    gate: Semaphore,
    breaker: Breaker,
    embed_cache: TtlLruCache<String, Vec<f32>>,
    metrics: Arc<Metrics>,
}

impl LlmMediator {
    pub fn new(config: MediatorConfig, metrics: Arc<Metrics>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let embed_cache = TtlLruCache::new(config.cache_capacity, config.cache_ttl);
        Self {
            gate: Semaphore::new(config.max_concurrency.max(1)),
            breaker: Breaker::new(config.max_failures, config.breaker_ttl),
            embed_cache,
            client,
            config,
            metrics,
        }
    }

    /// Embed every text, preserving input order. Cache hits bypass the gate
    /// and breaker entirely; misses are batched into one call.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MnemoError> {
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut miss_indices = Vec::new();
        let mut miss_texts = Vec::new();
        for (idx, text) in texts.iter().enumerate() {
            if let Some(cached) = self.embed_cache.get(text) {
                results.push(Some(cached));
            } else {
                results.push(None);
                miss_indices.push(idx);
                miss_texts.push(text.clone());
            }
        }

        if !miss_texts.is_empty() {
            let computed = if self.config.fake_mode {
                self.metrics.incr("llm.embed.success");
                miss_texts
                    .iter()
                    .map(|t| fake::fake_embedding(t, self.config.embedding_dim))
                    .collect::<Vec<_>>()
            } else {
                self.gated(|| transport::embed_http(&self.client, &self.config, &miss_texts))
                    .await?
            };

            for (slot, text) in miss_texts.iter().enumerate() {
                self.embed_cache.set(text.clone(), computed[slot].clone());
            }
            for (slot, text_idx) in miss_indices.into_iter().enumerate() {
                results[text_idx] = Some(computed[slot].clone());
            }
        }

        Ok(results.into_iter().map(|v| v.expect("every slot filled")).collect())
    }

    /// Send a system/user message pair and parse the response as JSON.
    pub async fn chat_json(&self, system: &str, user: &str) -> Result<serde_json::Value, MnemoError> {
        if self.config.fake_mode {
            self.metrics.incr("llm.chat.success");
            return Ok(fake::fake_chat_response(system, user));
        }
        self.gated(|| transport::chat_http(&self.client, &self.config, system, user))
            .await
    }

    async fn gated<F, Fut, T>(&self, call: F) -> Result<T, MnemoError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, MnemoError>>,
    {
        self.breaker.check()?;
        let _permit = self
            .gate
            .acquire()
            .await
            .expect("semaphore is never closed");

        let outcome = self.retrying(call).await;
        match &outcome {
            Ok(_) => self.breaker.record_success(),
            Err(_) => {
                self.breaker.record_failure();
                if self.breaker.is_open() {
                    self.metrics.incr("llm.breaker.opened");
                }
            }
        }
        outcome
    }

    async fn retrying<F, Fut, T>(&self, call: F) -> Result<T, MnemoError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, MnemoError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                // malformed JSON is not retriable — the server won't change its mind.
                Err(MnemoError::UpstreamMalformed(msg)) => {
                    return Err(MnemoError::UpstreamMalformed(msg));
                }
                Err(err) if attempt >= self.config.retry_attempts => {
                    warn!(attempt, "llm call exhausted retries");
                    return Err(err);
                }
                Err(err) => {
                    let backoff = Duration::from_millis(200 * 2u64.pow(attempt));
                    debug!(attempt, ?backoff, %err, "retrying llm call");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn mediator(fake_mode: bool) -> LlmMediator {
        let mut config = MediatorConfig::default();
        config.fake_mode = fake_mode;
        config.embedding_dim = 8;
        LlmMediator::new(config, Arc::new(Metrics::new()))
    }

    #[tokio::test]
    async fn fake_mode_embed_is_deterministic_and_correct_length() -> anyhow::Result<()> {
        let mediator = mediator(true);
        let a = mediator.embed(&["hello world".to_string()]).await?;
        let b = mediator.embed(&["hello world".to_string()]).await?;
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 8);
        Ok(())
    }

    #[tokio::test]
    async fn fake_mode_embed_preserves_request_order() -> anyhow::Result<()> {
        let mediator = mediator(true);
        let texts = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
        let vectors = mediator.embed(&texts).await?;
        assert_eq!(vectors.len(), 3);
        assert_ne!(vectors[0], vectors[1]);
        assert_ne!(vectors[1], vectors[2]);
        Ok(())
    }

    #[tokio::test]
    async fn embed_cache_hit_does_not_recompute() -> anyhow::Result<()> {
        let mediator = mediator(true);
        let first = mediator.embed(&["cached text".to_string()]).await?;
        let second = mediator.embed(&["cached text".to_string()]).await?;
        assert_eq!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn fake_chat_json_compare_branch() -> anyhow::Result<()> {
        let mediator = mediator(true);
        let response = mediator
            .chat_json("Decide the relation: same, update, or different?", "compare these")
            .await?;
        assert_eq!(response["relation"], "same");
        Ok(())
    }

    #[tokio::test]
    async fn fake_chat_json_rerank_branch_returns_empty_ids() -> anyhow::Result<()> {
        let mediator = mediator(true);
        let response = mediator
            .chat_json("Pick the best chunks by ranking context chunks", "n/a")
            .await?;
        assert_eq!(response["ids"].as_array().unwrap().len(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn fake_chat_json_extraction_seeds_decision_when_mentioned() -> anyhow::Result<()> {
        let mediator = mediator(true);
        let response = mediator
            .chat_json("Extract memory items", "we made a decision today")
            .await?;
        assert_eq!(response["decisions"].as_array().unwrap().len(), 1);
        assert_eq!(response["constraints"].as_array().unwrap().len(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn retry_stops_immediately_on_malformed_json() {
        let mediator = mediator(false);
        let attempts = Cell::new(0u32);
        let result: Result<(), MnemoError> = mediator
            .retrying(|| {
                attempts.set(attempts.get() + 1);
                async { Err(MnemoError::UpstreamMalformed("bad json".to_string())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.get(), 1, "malformed responses must not be retried");
    }

    #[tokio::test]
    async fn retry_exhausts_budget_on_transient_errors() {
        let mediator = mediator(false);
        let attempts = Cell::new(0u32);
        let result: Result<(), MnemoError> = mediator
            .retrying(|| {
                attempts.set(attempts.get() + 1);
                async { Err(MnemoError::UpstreamTransient("timeout".to_string())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.get(), mediator.config.retry_attempts + 1);
    }
}
