use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::cache::Cache;

/// In-memory cache for resolved role closures.
///
/// This is a simple LRU cache with optional TTL. It is intended for tests
/// and small deployments where a process-local cache is sufficient.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Arc<Mutex<CacheState>>,
    capacity: usize,
    ttl: Option<Duration>,
}

#[derive(Debug)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    roles: Vec<String>,
    updated_at: Instant,
}

impl MemoryCache {
    /// Creates a new cache with the given capacity.
    ///
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            })),
            capacity,
            ttl: None,
        }
    }

    /// Configures a time-to-live for cache entries.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    fn remove_key(state: &mut CacheState, key: &str) {
        if state.entries.remove(key).is_some() {
            state.order.retain(|existing| existing != key);
        }
    }

    fn touch(state: &mut CacheState, key: &str) {
        state.order.retain(|existing| existing != key);
        state.order.push_back(key.to_string());
    }

    fn is_expired(entry: &CacheEntry, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(entry.updated_at) > ttl
    }

    fn prune_expired(state: &mut CacheState, ttl: Duration, now: Instant) {
        state
            .entries
            .retain(|_, entry| !Self::is_expired(entry, ttl, now));
        state.order.retain(|key| state.entries.contains_key(key));
    }

    fn evict_if_needed(state: &mut CacheState, capacity: usize) {
        if capacity == 0 {
            state.entries.clear();
            state.order.clear();
            return;
        }

        while state.entries.len() > capacity {
            if let Some(key) = state.order.pop_front() {
                state.entries.remove(&key);
            } else {
                break;
            }
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get_roles(&self, principal: &str) -> Option<Vec<String>> {
        if self.capacity == 0 {
            return None;
        }

        let now = Instant::now();
        let mut guard = self.inner.lock().expect("poisoned lock");

        if let Some(ttl) = self.ttl
            && let Some(entry) = guard.entries.get(principal)
            && Self::is_expired(entry, ttl, now)
        {
            Self::remove_key(&mut guard, principal);
            return None;
        }

        let roles = guard.entries.get(principal).map(|entry| entry.roles.clone());
        if roles.is_some() {
            Self::touch(&mut guard, principal);
        }
        roles
    }

    async fn set_roles(&self, principal: &str, roles: Vec<String>) {
        if self.capacity == 0 {
            return;
        }

        let now = Instant::now();
        let mut guard = self.inner.lock().expect("poisoned lock");

        if let Some(ttl) = self.ttl {
            Self::prune_expired(&mut guard, ttl, now);
        }

        guard.entries.insert(
            principal.to_string(),
            CacheEntry {
                roles,
                updated_at: now,
            },
        );
        Self::touch(&mut guard, principal);
        Self::evict_if_needed(&mut guard, self.capacity);
    }

    async fn clear(&self) {
        let mut guard = self.inner.lock().expect("poisoned lock");
        guard.entries.clear();
        guard.order.clear();
    }
}
