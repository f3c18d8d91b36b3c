use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// Bounded mapping `K -> V` with TTL expiry and LRU eviction.
///
/// `get` and `set` both refresh the entry's position (`lru::LruCache`
/// already gives this discipline natively); at capacity, `set` evicts the
/// least-recently-touched entry. A `get` past its TTL is treated as a miss
/// and the stale entry is dropped rather than returned.
///
/// Single-process only; thread-safety is via an internal mutex since the
/// LLM mediator's gate admits multiple concurrent callers that all share one
/// cache instance.
pub struct TtlLruCache<K: Hash + Eq, V: Clone> {
    inner: Mutex<LruCache<K, Entry<V>>>,
    ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> TtlLruCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity must be nonzero");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        let expired = match guard.get(key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            guard.pop(key);
            return None;
        }
        guard.get(key).map(|entry| entry.value.clone())
    }

    pub fn set(&self, key: K, value: V) {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        guard.put(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_then_miss_after_ttl() {
        let cache: TtlLruCache<String, i32> = TtlLruCache::new(4, Duration::from_millis(20));
        cache.set("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn evicts_least_recently_touched_at_capacity() {
        let cache: TtlLruCache<String, i32> = TtlLruCache::new(2, Duration::from_secs(60));
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);
        // touch "a" so "b" becomes the least-recently-touched entry
        cache.get(&"a".to_string());
        cache.set("c".to_string(), 3);
        assert_eq!(cache.get(&"b".to_string()), None);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"c".to_string()), Some(3));
    }
}
