//! TTL-keyed read-through cache for normalized collections.
//!
//! The cache is a derived, disposable projection: the store is always the
//! source of truth, and any cache failure (lost entry, bad serialization)
//! degrades to recompute rather than erroring the caller. Expiry is lazy —
//! enforced at read time — so an expired entry is simply a miss.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    expires_at: Instant,
}

#[derive(Debug)]
struct CacheInner {
    map: HashMap<String, CacheEntry>,
    default_ttl: Duration,
}

impl CacheInner {
    fn new(default_ttl: Duration) -> Self {
        Self {
            map: HashMap::new(),
            default_ttl,
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).and_then(|entry| {
            if Instant::now() <= entry.expires_at {
                Some(entry.body.clone())
            } else {
                None
            }
        })
    }

    fn put(&mut self, key: String, body: String, ttl_override: Option<Duration>) {
        let ttl = ttl_override.unwrap_or(self.default_ttl);
        let expires_at = Instant::now() + ttl;
        self.map.insert(key, CacheEntry { body, expires_at });
    }

    fn delete(&mut self, key: &str) -> bool {
        self.map.remove(key).is_some()
    }

    fn delete_pattern(&mut self, pattern: &str) -> usize {
        let before = self.map.len();
        self.map.retain(|key, _| !glob_match(pattern, key));
        before - self.map.len()
    }

    fn clear_expired(&mut self) {
        let now = Instant::now();
        self.map.retain(|_, entry| entry.expires_at > now);
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

/// Glob-style key matching supporting `*` as "any run of characters".
///
/// `inventory:*` matches `inventory:full` and `inventory:summary`;
/// a pattern without `*` must match the key exactly.
///
/// Iterative with single-star backtracking, so matching stays linear in
/// the key length even for star-heavy patterns; `delete_pattern` accepts
/// arbitrary caller-supplied patterns.
fn glob_match(pattern: &str, key: &str) -> bool {
    let p = pattern.as_bytes();
    let k = key.as_bytes();
    let (mut pi, mut ki) = (0, 0);
    // Most recent `*` and the key index it currently covers up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while ki < k.len() {
        if pi < p.len() && p[pi] == b'*' {
            backtrack = Some((pi, ki));
            pi += 1;
        } else if pi < p.len() && p[pi] == k[ki] {
            pi += 1;
            ki += 1;
        } else if let Some((star, consumed)) = backtrack {
            // Mismatch past a star: widen what the star swallows by one
            // key byte and retry from just after it.
            pi = star + 1;
            ki = consumed + 1;
            backtrack = Some((star, consumed + 1));
        } else {
            return false;
        }
    }
    // Only trailing stars may remain once the key is consumed.
    p[pi..].iter().all(|&c| c == b'*')
}

/// Thread-safe in-memory TTL cache with pattern invalidation.
///
/// Reads and writes are independent per key; a `delete_pattern` racing a
/// concurrent `get` is tolerated (worst case one extra recompute).
#[derive(Debug, Clone)]
pub struct CacheStore {
    inner: Arc<tokio::sync::RwLock<CacheInner>>,
}

impl CacheStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner::new(default_ttl))),
        }
    }

    /// Default TTL of 5 minutes.
    pub fn with_default_ttl() -> Self {
        Self::new(Duration::from_secs(300))
    }

    /// Disabled cache: every read misses, every write is a no-op.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Typed read. Deserialization failures are treated as misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let body = self.inner.read().await.get(key)?;
        serde_json::from_str(&body).ok()
    }

    /// Typed write. Serialization failures drop the write silently — the
    /// cache is an optimization, never a hard dependency.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let Ok(body) = serde_json::to_string(value) else {
            return;
        };
        let mut store = self.inner.write().await;
        if store.default_ttl == Duration::ZERO {
            return;
        }
        store.put(key.to_string(), body, ttl);
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.inner.write().await.delete(key)
    }

    /// Remove all keys matching a glob-like pattern; returns the count.
    pub async fn delete_pattern(&self, pattern: &str) -> usize {
        self.inner.write().await.delete_pattern(pattern)
    }

    /// Compose a fetch function with cache-or-compute semantics: return the
    /// cached value on hit, otherwise compute, populate, and return.
    ///
    /// Concurrent callers racing on the same expired key may each compute
    /// and populate; last write wins.
    pub async fn with_cache<T, E, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        fetch: impl FnOnce() -> Fut,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get::<T>(key).await {
            return Ok(hit);
        }
        let value = fetch().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    pub async fn clear_expired(&self) {
        self.inner.write().await.clear_expired();
    }

    /// Entry count, including not-yet-collected expired entries.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_match_semantics() {
        assert!(glob_match("inventory:*", "inventory:full"));
        assert!(glob_match("inventory:*", "inventory:summary:2025"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("vendors", "vendors"));
        assert!(!glob_match("inventory:*", "vendors:all"));
        assert!(!glob_match("vendors", "vendors:all"));
        assert!(glob_match("*:summary", "inventory:summary"));
        assert!(glob_match("inv*ory:*", "inventory:full"));
        assert!(!glob_match("inv*ory:*", "vendors:all"));
        assert!(glob_match("**", ""));
    }

    #[test]
    fn star_heavy_patterns_match_in_linear_time() {
        // A pattern with many stars against a key that cannot match must
        // reject quickly instead of exploring every star split.
        let key = "a".repeat(2000);
        let pattern = format!("{}b", "a*".repeat(30));
        assert!(!glob_match(&pattern, &key));
        assert!(glob_match(&"a*".repeat(30), &key));
    }

    #[tokio::test]
    async fn typed_round_trip_and_miss() {
        let cache = CacheStore::new(Duration::from_secs(60));
        assert_eq!(cache.get::<Vec<i64>>("k").await, None);

        cache.set("k", &vec![1i64, 2, 3], None).await;
        assert_eq!(cache.get::<Vec<i64>>("k").await, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn expired_entries_read_as_misses() {
        let cache = CacheStore::new(Duration::from_millis(50));
        cache.set("k", &1i64, None).await;
        assert_eq!(cache.get::<i64>("k").await, Some(1));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get::<i64>("k").await, None);
    }

    #[tokio::test]
    async fn ttl_override_beats_default() {
        let cache = CacheStore::new(Duration::from_secs(60));
        cache
            .set("k", &1i64, Some(Duration::from_millis(50)))
            .await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get::<i64>("k").await, None);
    }

    #[tokio::test]
    async fn delete_pattern_counts_removals() {
        let cache = CacheStore::new(Duration::from_secs(60));
        cache.set("inventory:full", &1i64, None).await;
        cache.set("inventory:summary", &2i64, None).await;
        cache.set("vendors:all", &3i64, None).await;

        assert_eq!(cache.delete_pattern("inventory:*").await, 2);
        assert_eq!(cache.get::<i64>("inventory:full").await, None);
        assert_eq!(cache.get::<i64>("vendors:all").await, Some(3));
    }

    #[tokio::test]
    async fn with_cache_computes_only_on_miss() {
        let cache = CacheStore::new(Duration::from_secs(60));
        let mut calls = 0u32;

        let first: Result<i64, ()> = cache
            .with_cache("answer", None, || {
                calls += 1;
                async { Ok(41 + 1) }
            })
            .await;
        assert_eq!(first, Ok(42));

        let second: Result<i64, ()> = cache
            .with_cache("answer", None, || {
                calls += 1;
                async { Ok(0) }
            })
            .await;
        assert_eq!(second, Ok(42));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn with_cache_propagates_compute_errors_without_caching() {
        let cache = CacheStore::new(Duration::from_secs(60));

        let failed: Result<i64, &str> = cache
            .with_cache("k", None, || async { Err("upstream down") })
            .await;
        assert_eq!(failed, Err("upstream down"));

        let ok: Result<i64, &str> = cache.with_cache("k", None, || async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
    }

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = CacheStore::disabled();
        cache.set("k", &1i64, None).await;
        assert_eq!(cache.get::<i64>("k").await, None);
        assert!(cache.is_empty().await);
    }
}
