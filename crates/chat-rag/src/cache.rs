//! Answer memoization keyed by the enriched question
//!
//! Least-recently-used eviction at a fixed capacity, plus a time-to-live. Keys
//! are SHA-256 digests of the trimmed question text.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::PipelineResult;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: PipelineResult,
    cached_at: DateTime<Utc>,
    last_used: u64,
    hit_count: u32,
}

/// LRU cache of pipeline results
pub struct AnswerCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    capacity: usize,
    ttl_seconds: u64,
    clock: AtomicU64,
}

impl AnswerCache {
    /// Create a cache holding at most `capacity` answers for `ttl_seconds` each
    pub fn new(capacity: usize, ttl_seconds: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl_seconds,
            clock: AtomicU64::new(0),
        }
    }

    fn hash_question(question: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(question.trim().as_bytes());
        hex::encode(hasher.finalize())
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Look up a cached result, marking it recently used
    pub fn get(&self, question: &str) -> Option<PipelineResult> {
        let key = Self::hash_question(question);
        let mut entries = self.entries.write();

        let age = Utc::now().signed_duration_since(entries.get(&key)?.cached_at);
        if age >= Duration::seconds(self.ttl_seconds as i64) {
            entries.remove(&key);
            tracing::debug!("Cache expired: {}", &key[..12]);
            return None;
        }

        let entry = entries.get_mut(&key)?;
        entry.last_used = self.tick();
        entry.hit_count += 1;
        tracing::debug!("Cache hit: {} (hits: {})", &key[..12], entry.hit_count);

        let mut result = entry.result.clone();
        result.cached = true;
        Some(result)
    }

    /// Store a result; degraded answers are ignored
    pub fn put(&self, question: &str, result: &PipelineResult) {
        if result.generation_failed {
            return;
        }

        let key = Self::hash_question(question);
        let entry = CacheEntry {
            result: PipelineResult {
                cached: false,
                ..result.clone()
            },
            cached_at: Utc::now(),
            last_used: self.tick(),
            hit_count: 0,
        };

        let mut entries = self.entries.write();
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            if let Some(oldest_key) = entries
                .iter()
                .min_by_key(|(_, v)| v.last_used)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest_key);
            }
        }
        entries.insert(key.clone(), entry);

        tracing::debug!("Cached answer: {}", &key[..12]);
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.entries.write().clear();
        tracing::info!("Answer cache cleared");
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read();
        CacheStats {
            entries: entries.len(),
            total_hits: entries.values().map(|e| e.hit_count).sum(),
            capacity: self.capacity,
            ttl_seconds: self.ttl_seconds,
        }
    }
}

impl Default for AnswerCache {
    fn default() -> Self {
        Self::new(128, 3600)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_hits: u32,
    pub capacity: usize,
    pub ttl_seconds: u64,
}
