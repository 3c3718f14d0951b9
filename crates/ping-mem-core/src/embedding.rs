//! Embedding provider abstraction and content-addressable cache (C2).
//!
//! [`EmbeddingProvider`] abstracts the deterministic local vectorizer (C1)
//! and any external network LLM provider behind one interface. Concrete
//! network providers (HTTP calls, retry/backoff) live in the application
//! layer that depends on this crate — `ping-mem-core` itself ships only
//! the always-available [`LocalProvider`].

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::vectorizer::vectorize;

/// An embedding backend: deterministic local hashing or an external model.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier, e.g. `"ping-mem-local-v1"` or `"text-embedding-3-small"`.
    fn model_name(&self) -> &str;

    /// Output vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, in input order. Default implementation
    /// embeds sequentially; network providers should override with a
    /// real batch call.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed(t).await?);
        }
        Ok(out)
    }
}

/// The deterministic local provider (C1), always available, used as the
/// default and as a fallback when no network provider is configured.
pub struct LocalProvider {
    dims: usize,
}

impl LocalProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new(crate::vectorizer::DEFAULT_DIMS)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        "ping-mem-local-v1"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(vectorize(text, self.dims))
    }
}

/// Stats snapshot for [`EmbeddingCache`].
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub hit_rate: f64,
}

struct CacheEntry {
    vector: Vec<f32>,
    inserted_at: Instant,
}

/// Content-addressable embedding cache, keyed by SHA-256 of the input
/// text. Bounded by `max_entries` with LRU eviction on overflow and TTL
/// expiry checked on read.
pub struct EmbeddingCache {
    max_entries: usize,
    ttl: Duration,
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Most-recently-used key at the back.
    order: Vec<String>,
    hits: u64,
    misses: u64,
}

impl EmbeddingCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            max_entries,
            ttl,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: Vec::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    fn key_for(text: &str) -> String {
        format!("{:x}", Sha256::digest(text.as_bytes()))
    }

    /// Look up a cached vector for `text`. Expires and evicts the entry
    /// in-place if its TTL has elapsed.
    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        let key = Self::key_for(text);
        let mut inner = self.inner.lock().unwrap();

        let expired = inner
            .entries
            .get(&key)
            .map(|e| e.inserted_at.elapsed() > self.ttl)
            .unwrap_or(false);

        if expired {
            inner.entries.remove(&key);
            inner.order.retain(|k| k != &key);
            inner.misses += 1;
            return None;
        }

        if let Some(entry) = inner.entries.get(&key) {
            let vector = entry.vector.clone();
            inner.order.retain(|k| k != &key);
            inner.order.push(key);
            inner.hits += 1;
            Some(vector)
        } else {
            inner.misses += 1;
            None
        }
    }

    /// Insert a vector for `text`, evicting the least-recently-used entry
    /// if the cache is at capacity.
    pub fn put(&self, text: &str, vector: Vec<f32>) {
        let key = Self::key_for(text);
        let mut inner = self.inner.lock().unwrap();

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_entries {
            if let Some(lru_key) = inner.order.first().cloned() {
                inner.entries.remove(&lru_key);
                inner.order.remove(0);
            }
        }

        inner.order.retain(|k| k != &key);
        inner.order.push(key.clone());
        inner.entries.insert(
            key,
            CacheEntry {
                vector,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap();
        let total = inner.hits + inner.misses;
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
            hit_rate: if total == 0 {
                0.0
            } else {
                inner.hits as f64 / total as f64
            },
        }
    }
}

/// Wraps a provider with the content-addressable cache, the unit the rest
/// of the core depends on.
pub struct EmbeddingService {
    provider: Box<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
}

impl EmbeddingService {
    pub fn new(provider: Box<dyn EmbeddingProvider>, cache: EmbeddingCache) -> Self {
        Self { provider, cache }
    }

    pub fn local(dims: usize) -> Self {
        Self::new(
            Box::new(LocalProvider::new(dims)),
            EmbeddingCache::new(10_000, Duration::from_secs(3600)),
        )
    }

    pub fn dims(&self) -> usize {
        self.provider.dims()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Embed `text`, serving from cache when possible. Provider errors are
    /// wrapped as [`Error::Embedding`] — fatal to the calling search mode,
    /// never to the caller's other concurrent work.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self.cache.get(text) {
            return Ok(cached);
        }
        let vector = self
            .provider
            .embed(text)
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;
        self.cache.put(text, vector.clone());
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_provider_is_deterministic() {
        let svc = EmbeddingService::local(64);
        let a = svc.embed("hello").await.unwrap();
        let b = svc.embed("hello").await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn cache_hit_after_put() {
        let cache = EmbeddingCache::new(4, Duration::from_secs(60));
        cache.put("a", vec![1.0, 2.0]);
        assert_eq!(cache.get("a"), Some(vec![1.0, 2.0]));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn cache_evicts_lru_on_overflow() {
        let cache = EmbeddingCache::new(2, Duration::from_secs(60));
        cache.put("a", vec![1.0]);
        cache.put("b", vec![2.0]);
        // touch "a" so "b" becomes LRU
        let _ = cache.get("a");
        cache.put("c", vec![3.0]);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn cache_expires_by_ttl() {
        let cache = EmbeddingCache::new(4, Duration::from_millis(1));
        cache.put("a", vec![1.0]);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn cache_stats_hit_rate() {
        let cache = EmbeddingCache::new(4, Duration::from_secs(60));
        cache.put("a", vec![1.0]);
        let _ = cache.get("a");
        let _ = cache.get("missing");
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
    }
}
