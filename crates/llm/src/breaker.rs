use std::sync::Mutex;
use std::time::{Duration, Instant};

use mnemo_core::MnemoError;

struct State {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Per-mediator consecutive-failure breaker. Opens on reaching
/// `max_failures`; one success resets the counter; after `ttl` elapses from
/// open-time the next call is let through (half-open) and the outcome of
/// that call decides whether it stays open or resets.
pub(crate) struct Breaker {
    max_failures: u32,
    ttl: Duration,
    state: Mutex<State>,
}

impl Breaker {
    pub(crate) fn new(max_failures: u32, ttl: Duration) -> Self {
        Self {
            max_failures,
            ttl,
            state: Mutex::new(State {
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// Fails fast with `BreakerOpen` while open and the TTL has not elapsed.
    pub(crate) fn check(&self) -> Result<(), MnemoError> {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        if let Some(opened_at) = state.opened_at {
            if opened_at.elapsed() < self.ttl {
                return Err(MnemoError::BreakerOpen);
            }
            // TTL elapsed: let this call through half-open; outcome decides next state.
            state.opened_at = None;
        }
        Ok(())
    }

    pub(crate) fn record_success(&self) {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        state.consecutive_failures = 0;
        state.opened_at = None;
    }

    pub(crate) fn record_failure(&self) {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.max_failures && state.opened_at.is_none() {
            state.opened_at = Some(Instant::now());
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state
            .lock()
            .expect("breaker mutex poisoned")
            .opened_at
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_at_exactly_max_failures() {
        let breaker = Breaker::new(3, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
        breaker.record_failure();
        assert!(breaker.is_open());
    }

    #[test]
    fn one_success_resets_the_counter() {
        let breaker = Breaker::new(3, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open(), "counter should have reset after the success");
    }

    #[test]
    fn check_fails_fast_while_open() {
        let breaker = Breaker::new(1, Duration::from_secs(60));
        breaker.record_failure();
        assert!(matches!(breaker.check(), Err(MnemoError::BreakerOpen)));
    }

    #[test]
    fn check_allows_call_through_after_ttl_elapses() {
        let breaker = Breaker::new(1, Duration::from_millis(10));
        breaker.record_failure();
        assert!(breaker.check().is_err());
        std::thread::sleep(Duration::from_millis(20));
        assert!(breaker.check().is_ok());
    }
}
