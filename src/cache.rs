use crate::config::CacheKeyScope;
use crate::models::FaceResult;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Number of leading payload characters hashed under [`CacheKeyScope::Prefix`].
pub const KEY_PREFIX_CHARS: usize = 1000;

pub type CacheKey = String;

/// Derives the cache key for a raw, still-encoded frame payload.
///
/// With the prefix scope two payloads that share their first
/// [`KEY_PREFIX_CHARS`] characters map to the same key.
pub fn cache_key(frame: &str, scope: CacheKeyScope) -> CacheKey {
    let source = match scope {
        CacheKeyScope::Prefix => match frame.char_indices().nth(KEY_PREFIX_CHARS) {
            Some((end, _)) => &frame[..end],
            None => frame,
        },
        CacheKeyScope::Full => frame,
    };

    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Bounded map of formatted analysis results.
///
/// Eviction is FIFO by insertion: when full, the entry inserted first is
/// dropped. Lookups never refresh an entry's position.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<Mutex<Store>>,
    capacity: usize,
}

#[derive(Default)]
struct Store {
    entries: HashMap<CacheKey, Vec<FaceResult>>,
    order: VecDeque<CacheKey>,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            capacity,
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<FaceResult>> {
        self.lock().entries.get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, value: Vec<FaceResult>) {
        if self.capacity == 0 {
            return;
        }

        let mut store = self.lock();

        // Last write wins; the key keeps its original insertion slot.
        if let Some(existing) = store.entries.get_mut(&key) {
            *existing = value;
            return;
        }

        if store.entries.len() >= self.capacity {
            if let Some(oldest) = store.order.pop_front() {
                store.entries.remove(&oldest);
                debug!(key = %oldest, "Evicted oldest cached result");
            }
        }

        store.order.push_back(key.clone());
        store.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        // Every mutation completes before the guard drops, so a poisoned
        // store is still consistent.
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
