use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    /// `None` when the TTL reaches past the clock's range.
    expires_at: Option<Instant>,
    sequence: u64,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

/// Bounded key/value cache with a fixed time-to-live.
///
/// Callers pass the current `Instant` so expiry is deterministic under test.
/// When full, expired entries are purged first and then the oldest inserted
/// entry is evicted.
pub struct TtlCache<V> {
    ttl: Duration,
    capacity: usize,
    entries: HashMap<String, Entry<V>>,
    next_sequence: u64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: HashMap::new(),
            next_sequence: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&mut self, key: &str, now: Instant) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn insert(&mut self, key: String, value: V, now: Instant) {
        if self.capacity == 0 {
            return;
        }

        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.purge_expired(now);
            if self.entries.len() >= self.capacity {
                self.evict_oldest();
            }
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: now.checked_add(self.ttl),
                sequence,
            },
        );
    }

    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn invalidate_prefix(&mut self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before - self.entries.len()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.sequence)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}
