use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Process-wide call counters.
///
/// Every component that the spec calls out as having "observable" counters
/// (the LLM mediator's per-call-type success/failure, the job engine's
/// per-type outcomes, the dispatcher's per-tool latency/count) shares one of
/// these. Kept deliberately dumb: a named counter map behind a mutex plus a
/// handful of always-present atomics for the hot paths.
#[derive(Debug, Default)]
pub struct Metrics {
    named: Mutex<HashMap<String, u64>>,
    pub low_confidence_retrievals: AtomicU64,
    pub breaker_trips: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, name: &str) {
        self.incr_by(name, 1);
    }

    pub fn incr_by(&self, name: &str, amount: u64) {
        let mut guard = self.named.lock().expect("metrics mutex poisoned");
        *guard.entry(name.to_string()).or_insert(0) += amount;
    }

    pub fn get(&self, name: &str) -> u64 {
        let guard = self.named.lock().expect("metrics mutex poisoned");
        guard.get(name).copied().unwrap_or(0)
    }

    /// Snapshot of every named counter, for a status/health surface.
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.named.lock().expect("metrics mutex poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let metrics = Metrics::new();
        metrics.incr("llm.embed.success");
        metrics.incr("llm.embed.success");
        metrics.incr("llm.chat.failure");
        assert_eq!(metrics.get("llm.embed.success"), 2);
        assert_eq!(metrics.get("llm.chat.failure"), 1);
        assert_eq!(metrics.get("unknown"), 0);
    }

    #[test]
    fn snapshot_contains_all_named_counters() {
        let metrics = Metrics::new();
        metrics.incr_by("job.embed_turn.done", 3);
        let snap = metrics.snapshot();
        assert_eq!(snap.get("job.embed_turn.done"), Some(&3));
    }
}
