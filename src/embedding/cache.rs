// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Embedding cache with LRU eviction and TTL.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use super::base::EmbeddingVector;

/// Default cache TTL (60 minutes).
const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Default max cache size.
const DEFAULT_MAX_SIZE: usize = 1000;

struct CacheEntry {
    embedding: EmbeddingVector,
    created_at: Instant,
    last_accessed: Instant,
}

impl CacheEntry {
    fn new(embedding: EmbeddingVector) -> Self {
        let now = Instant::now();
        Self {
            embedding,
            created_at: now,
            last_accessed: now,
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Thread-safe embedding cache.
pub struct EmbeddingCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_size: usize,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: DEFAULT_TTL,
            max_size: DEFAULT_MAX_SIZE,
        }
    }

    pub fn with_config(ttl: Duration, max_size: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_size,
        }
    }

    /// Generate a cache key for a text.
    pub fn make_key(provider: &str, model: &str, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let hash = hex::encode(hasher.finalize());
        format!("{}:{}:{}", provider, model, &hash[..16])
    }

    /// Get an embedding from cache.
    pub fn get(&self, key: &str) -> Option<EmbeddingVector> {
        let mut entries = self.entries.write().ok()?;

        if let Some(entry) = entries.get_mut(key) {
            if entry.is_expired(self.ttl) {
                entries.remove(key);
                return None;
            }
            entry.last_accessed = Instant::now();
            return Some(entry.embedding.clone());
        }

        None
    }

    /// Put an embedding into cache.
    pub fn put(&self, key: String, embedding: EmbeddingVector) {
        let mut entries = match self.entries.write() {
            Ok(e) => e,
            Err(_) => return,
        };

        if entries.len() >= self.max_size {
            Self::evict_oldest(&mut entries);
        }

        entries.insert(key, CacheEntry::new(embedding));
    }

    fn evict_oldest(entries: &mut HashMap<String, CacheEntry>) {
        if let Some(oldest_key) = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone())
        {
            entries.remove(&oldest_key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_roundtrip() {
        let cache = EmbeddingCache::new();
        let key = EmbeddingCache::make_key("Ollama", "nomic-embed-text", "hello");
        cache.put(key.clone(), EmbeddingVector::new(vec![1.0, 2.0]));

        let cached = cache.get(&key).unwrap();
        assert_eq!(cached.values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_cache_miss() {
        let cache = EmbeddingCache::new();
        assert!(cache.get("nope").is_none());
    }

    #[test]
    fn test_cache_key_varies_by_text_and_model() {
        let a = EmbeddingCache::make_key("Ollama", "m1", "text");
        let b = EmbeddingCache::make_key("Ollama", "m1", "other");
        let c = EmbeddingCache::make_key("Ollama", "m2", "text");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = EmbeddingCache::with_config(Duration::from_millis(0), 10);
        cache.put("k".to_string(), EmbeddingVector::new(vec![1.0]));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_lru_eviction_keeps_capacity() {
        let cache = EmbeddingCache::with_config(Duration::from_secs(60), 2);
        cache.put("a".to_string(), EmbeddingVector::new(vec![1.0]));
        cache.put("b".to_string(), EmbeddingVector::new(vec![2.0]));
        cache.put("c".to_string(), EmbeddingVector::new(vec![3.0]));
        assert_eq!(cache.len(), 2);
    }
}
