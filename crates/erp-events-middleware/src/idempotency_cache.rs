//! Bounded in-process cache of processed `(consumer, event_id)` keys. Eviction
//! is FIFO, matching the store-agnostic invariant a compiled validator or an
//! LRU crate would otherwise obscure — positive hits short-circuit the store
//! lookup entirely; a miss always falls through to the store.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

pub struct IdempotencyCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    order: VecDeque<(String, Uuid)>,
    seen: HashSet<(String, Uuid)>,
}

impl IdempotencyCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                order: VecDeque::with_capacity(capacity.min(1024)),
                seen: HashSet::new(),
            }),
        }
    }

    /// `true` if this key has previously been recorded as processed.
    pub fn contains(&self, consumer: &str, event_id: Uuid) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.seen.contains(&(consumer.to_string(), event_id))
    }

    /// Record the key as processed, evicting the oldest entry if at capacity.
    pub fn insert(&self, consumer: &str, event_id: Uuid) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        let key = (consumer.to_string(), event_id);
        if inner.seen.contains(&key) {
            return;
        }
        if inner.order.len() >= self.capacity
            && let Some(oldest) = inner.order.pop_front()
        {
            inner.seen.remove(&oldest);
        }
        inner.order.push_back(key.clone());
        inner.seen.insert(key);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_on_empty_cache() {
        let cache = IdempotencyCache::new(10);
        assert!(!cache.contains("billing", Uuid::new_v4()));
    }

    #[test]
    fn hit_after_insert() {
        let cache = IdempotencyCache::new(10);
        let id = Uuid::new_v4();
        cache.insert("billing", id);
        assert!(cache.contains("billing", id));
    }

    #[test]
    fn eviction_is_fifo_when_full() {
        let cache = IdempotencyCache::new(2);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        cache.insert("billing", a);
        cache.insert("billing", b);
        cache.insert("billing", c);
        assert!(!cache.contains("billing", a));
        assert!(cache.contains("billing", b));
        assert!(cache.contains("billing", c));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn distinct_consumers_are_independent_keys() {
        let cache = IdempotencyCache::new(10);
        let id = Uuid::new_v4();
        cache.insert("billing", id);
        assert!(!cache.contains("shipping", id));
    }

    #[test]
    fn reinserting_existing_key_does_not_grow_or_reorder() {
        let cache = IdempotencyCache::new(2);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        cache.insert("billing", a);
        cache.insert("billing", b);
        cache.insert("billing", a);
        assert_eq!(cache.len(), 2);
        let c = Uuid::new_v4();
        cache.insert("billing", c);
        // a was touched again by the no-op re-insert but FIFO order is by
        // first insertion, so a (oldest original) is evicted, not b.
        assert!(!cache.contains("billing", a));
        assert!(cache.contains("billing", b));
    }
}
