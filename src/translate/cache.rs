//! Session translation cache.
//! Key: blake3 hash of (backend id | target lang | masked text).
//! No per-entry eviction: reaching capacity clears the whole map.

use std::collections::HashMap;

use tracing::debug;

pub type CacheKey = [u8; 32];

pub const DEFAULT_CAPACITY: usize = 5000;

pub struct SessionCache {
    entries: HashMap<CacheKey, String>,
    capacity: usize,
}

impl SessionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Compute the cache key from translation parameters.
    pub fn compute_key(backend_id: u8, target_lang: &str, masked_text: &str) -> CacheKey {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[backend_id]);
        hasher.update(b"|");
        hasher.update(target_lang.as_bytes());
        hasher.update(b"|");
        hasher.update(masked_text.as_bytes());
        *hasher.finalize().as_bytes()
    }

    pub fn get(&self, key: &CacheKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Clear everything if the cache is full. Called on every miss before a new job.
    /// Returns true if the cache was cleared.
    pub fn make_room(&mut self) -> bool {
        if self.entries.len() >= self.capacity {
            debug!(entries = self.entries.len(), capacity = self.capacity, "session cache full, clearing");
            self.entries.clear();
            return true;
        }
        false
    }

    /// Insert a translation, clearing first if the cache is full.
    pub fn insert(&mut self, key: CacheKey, translated_text: String) {
        if !self.entries.contains_key(&key) {
            self.make_room();
        }
        self.entries.insert(key, translated_text);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shrinking below the current size clears the cache.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        if self.entries.len() > self.capacity {
            self.entries.clear();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
