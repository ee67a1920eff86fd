use std::collections::{BTreeMap, HashMap};

use crate::video::backend::VideoFrame;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
}

struct Entry {
    frame: VideoFrame,
    tick: u64,
}

/// Strict-LRU cache of decoded frames keyed by presentation index.
///
/// Recency is the last `get` or `insert`. `by_tick` orders entries by recency so the oldest
/// entry is the first key.
pub(crate) struct FrameCache {
    capacity: usize,
    next_tick: u64,
    entries: HashMap<usize, Entry>,
    by_tick: BTreeMap<u64, usize>,
    stats: FrameCacheStats,
}

impl FrameCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_tick: 0,
            entries: HashMap::new(),
            by_tick: BTreeMap::new(),
            stats: FrameCacheStats::default(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains(&self, idx: usize) -> bool {
        self.entries.contains_key(&idx)
    }

    pub(crate) fn stats(&self) -> FrameCacheStats {
        self.stats.clone()
    }

    fn bump(&mut self) -> u64 {
        let t = self.next_tick;
        self.next_tick = self.next_tick.wrapping_add(1);
        t
    }

    /// Cached frame, promoted to most recently used.
    pub(crate) fn get(&mut self, idx: usize) -> Option<VideoFrame> {
        let tick = self.bump();
        let Some(entry) = self.entries.get_mut(&idx) else {
            self.stats.misses = self.stats.misses.saturating_add(1);
            return None;
        };
        self.by_tick.remove(&entry.tick);
        entry.tick = tick;
        self.by_tick.insert(tick, idx);
        self.stats.hits = self.stats.hits.saturating_add(1);
        Some(entry.frame.clone())
    }

    pub(crate) fn insert(&mut self, idx: usize, frame: VideoFrame) {
        if self.capacity == 0 {
            return;
        }
        let tick = self.bump();
        if let Some(old) = self.entries.insert(idx, Entry { frame, tick }) {
            self.by_tick.remove(&old.tick);
        } else {
            while self.entries.len() > self.capacity {
                self.evict_oldest();
            }
        }
        self.by_tick.insert(tick, idx);
        self.stats.inserts = self.stats.inserts.saturating_add(1);
    }

    fn evict_oldest(&mut self) {
        let Some((_, idx)) = self.by_tick.pop_first() else {
            return;
        };
        if self.entries.remove(&idx).is_some() {
            self.stats.evictions = self.stats.evictions.saturating_add(1);
            tracing::trace!(frame = idx, "evicted cached frame");
        }
    }

    /// Drop every cached frame.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.by_tick.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/video/cache.rs"]
mod tests;
