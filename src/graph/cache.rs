use std::collections::HashMap;
use std::sync::Mutex;

use super::PathResolver;
use crate::error::Result;

pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Bounded memo of successful next-hop lookups keyed by `(map, src, dst)`.
///
/// Failures are never cached. When full the cache is flushed wholesale.
/// The movement round clears it before stepping any army, so map edits are
/// picked up at the next round.
#[derive(Debug)]
pub struct CachingResolver<R> {
    inner: R,
    capacity: usize,
    entries: Mutex<HashMap<(String, u64, u64), u64>>,
}

impl<R: PathResolver> CachingResolver<R> {
    pub fn new(inner: R, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: PathResolver> PathResolver for CachingResolver<R> {
    fn step(&self, map: &str, src: u64, dst: u64) -> Result<u64> {
        let key = (map.to_string(), src, dst);
        if let Ok(entries) = self.entries.lock() {
            if let Some(hop) = entries.get(&key) {
                return Ok(*hop);
            }
        }
        let hop = self.inner.step(map, src, dst)?;
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() >= self.capacity {
                entries.clear();
            }
            entries.insert(key, hop);
        }
        Ok(hop)
    }
}
