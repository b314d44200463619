use crate::error::CacheError;
use crate::model::{Profile, TagCount};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const POPULAR_TAGS_KEY: &str = "popular_tags";
pub const TOP_USERS_KEY: &str = "top_users";

/// TTL-aware key/value store holding derived, expendable snapshots.
pub trait CacheStore: Send + Sync {
    /// `None` when the key was never written or its TTL has elapsed.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    /// Overwrites any previous value; last writer wins.
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
}

/// Time source for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant { Instant::now() }
}

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self { Self { now: Arc::new(Mutex::new(Instant::now())) } }
    pub fn advance(&self, by: Duration) { *self.now.lock() += by; }
}

impl Default for ManualClock {
    fn default() -> Self { Self::new() }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant { *self.now.lock() }
}

struct Entry {
    value: Vec<u8>,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process cache store.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new() -> Self { Self::with_clock(Arc::new(SystemClock)) }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { entries: RwLock::new(HashMap::new()), clock }
    }
}

impl Default for MemoryCache {
    fn default() -> Self { Self::new() }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return Ok(None),
                Some(e) if e.is_live(now) => return Ok(Some(e.value.clone())),
                Some(_) => {}
            }
        }
        // expired: purge unless a fresh write raced in
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = self.clock.now().checked_add(ttl);
        self.entries.write().insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(cache: &dyn CacheStore, key: &str) -> Option<T> {
    let bytes = match cache.get(key) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(key, error = %e, "cache read failed");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding undecodable cache entry");
            None
        }
    }
}

/// Cached popular tags, or `None` when no ranking is available.
pub fn read_popular_tags(cache: &dyn CacheStore) -> Option<Vec<TagCount>> {
    read_json(cache, POPULAR_TAGS_KEY)
}

/// Cached top users, or `None` when no ranking is available.
pub fn read_top_users(cache: &dyn CacheStore) -> Option<Vec<Profile>> {
    read_json(cache, TOP_USERS_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_clock() -> (MemoryCache, ManualClock) {
        let clock = ManualClock::new();
        (MemoryCache::with_clock(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn entry_expires_after_ttl() {
        let (cache, clock) = cache_with_clock();
        cache.set("k", b"v".to_vec(), Duration::from_secs(60)).unwrap();
        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get("k").unwrap(), Some(b"v".to_vec()));
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("k").unwrap(), None);
        assert!(cache.entries.read().is_empty());
    }

    #[test]
    fn unrepresentable_ttl_never_expires() {
        let (cache, clock) = cache_with_clock();
        cache.set("k", b"v".to_vec(), Duration::MAX).unwrap();
        cache.set("j", b"w".to_vec(), Duration::from_secs(u64::MAX)).unwrap();
        clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));
        assert_eq!(cache.get("k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(cache.get("j").unwrap(), Some(b"w".to_vec()));
    }

    #[test]
    fn rewrite_extends_lifetime() {
        let (cache, clock) = cache_with_clock();
        cache.set("k", b"old".to_vec(), Duration::from_secs(10)).unwrap();
        clock.advance(Duration::from_secs(8));
        cache.set("k", b"new".to_vec(), Duration::from_secs(10)).unwrap();
        clock.advance(Duration::from_secs(8));
        assert_eq!(cache.get("k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn missing_or_garbled_ranking_reads_as_absent() {
        let cache = MemoryCache::new();
        assert!(read_popular_tags(&cache).is_none());
        cache.set(TOP_USERS_KEY, b"not json".to_vec(), Duration::from_secs(5)).unwrap();
        assert!(read_top_users(&cache).is_none());
    }
}
