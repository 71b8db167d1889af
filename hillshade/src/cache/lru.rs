//! Completed-render LRU with count and byte budgets.

use super::future::RenderFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Keeps strong references to completed [`RenderFuture`]s under two
/// independent budgets: an entry-count cap and a byte cap. The
/// `min_count` floor stops byte-driven eviction from starving the cache
/// when a few high-quality renders exceed the byte budget on their own.
///
/// Everything serialises on the entry deque's lock; the byte counter is
/// atomic only so [`Lru::size_bytes`] reads lock-free.
pub struct Lru {
    min_count: usize,
    max_count: usize,
    max_bytes: u64,
    entries: Mutex<VecDeque<Arc<RenderFuture>>>,
    size_bytes: AtomicU64,
}

impl Lru {
    pub fn new(min_count: usize, max_count: usize, max_bytes: u64) -> Self {
        Self {
            min_count,
            max_count,
            max_bytes,
            entries: Mutex::new(VecDeque::new()),
            size_bytes: AtomicU64::new(0),
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes.load(Ordering::Relaxed)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Move `fresh` to the most-recently-used end and evict down to the
    /// budgets.
    ///
    /// The future must already be completed: callers invoke this after
    /// awaiting it, so its byte size is final.
    pub fn mark_used(&self, fresh: &Arc<RenderFuture>) {
        if self.max_bytes == 0 {
            return;
        }
        let bytes = fresh.size_bytes();
        let mut entries = self.entries.lock().unwrap();

        if let Some(position) = entries.iter().position(|entry| Arc::ptr_eq(entry, fresh)) {
            entries.remove(position);
            self.size_bytes.fetch_sub(bytes, Ordering::Relaxed);
        }
        entries.push_back(Arc::clone(fresh));
        self.size_bytes.fetch_add(bytes, Ordering::Relaxed);

        while entries.len() > self.max_count
            || (entries.len() > self.min_count
                && self.size_bytes.load(Ordering::Relaxed) > self.max_bytes)
        {
            self.evict_oldest(&mut entries);
        }
    }

    /// Evict until `wanted` more bytes fit within the byte budget, or
    /// the cache is empty. Called before awaiting a fresh render so the
    /// eviction happens before the new bytes materialise.
    pub fn ensure_enough_space(&self, wanted: u64) {
        let mut entries = self.entries.lock().unwrap();
        while !entries.is_empty()
            && wanted + self.size_bytes.load(Ordering::Relaxed) > self.max_bytes
        {
            self.evict_oldest(&mut entries);
        }
    }

    fn evict_oldest(&self, entries: &mut VecDeque<Arc<RenderFuture>>) {
        if let Some(evicted) = entries.pop_front() {
            self.size_bytes
                .fetch_sub(evicted.size_bytes(), Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::ShadeBitmap;

    /// Completed future of a given byte size, bypassing the render path.
    fn completed_future(bytes: u64) -> Arc<RenderFuture> {
        let side = (bytes as f64).sqrt() as usize;
        assert_eq!(side * side, bytes as usize, "use square sizes in tests");
        let bitmap = Arc::new(ShadeBitmap::new(side, side, 0, vec![0; side * side]));
        Arc::new(RenderFuture::completed_for_tests(Some(bitmap)))
    }

    const MB: u64 = 1 << 20;

    fn mb_future(megabytes: u64) -> Arc<RenderFuture> {
        completed_future(megabytes * MB)
    }

    #[test]
    fn test_mark_used_accumulates_bytes() {
        let lru = Lru::new(0, 10, 100 * MB);
        let a = mb_future(4);
        let b = mb_future(4);
        lru.mark_used(&a);
        lru.mark_used(&b);
        assert_eq!(lru.entry_count(), 2);
        assert_eq!(lru.size_bytes(), 8 * MB);
    }

    #[test]
    fn test_mark_used_moves_entry_to_mru_end() {
        let lru = Lru::new(0, 2, 100 * MB);
        let a = mb_future(1);
        let b = mb_future(1);
        let c = mb_future(1);

        lru.mark_used(&a);
        lru.mark_used(&b);
        lru.mark_used(&a); // refresh a; b is now the eviction candidate
        lru.mark_used(&c);

        let entries = lru.entries.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|entry| Arc::ptr_eq(entry, &a)));
        assert!(entries.iter().any(|entry| Arc::ptr_eq(entry, &c)));
    }

    #[test]
    fn test_dual_budget_eviction_order() {
        // min 2, max 3 entries, 10 MB: four 4 MB renders leave {C, D}.
        let lru = Lru::new(2, 3, 10 * MB);
        let futures: Vec<_> = (0..4).map(|_| mb_future(4)).collect();
        for future in &futures {
            lru.mark_used(future);
        }

        assert_eq!(lru.entry_count(), 2);
        assert_eq!(lru.size_bytes(), 8 * MB);
        let entries = lru.entries.lock().unwrap();
        assert!(entries.iter().any(|entry| Arc::ptr_eq(entry, &futures[2])));
        assert!(entries.iter().any(|entry| Arc::ptr_eq(entry, &futures[3])));
    }

    #[test]
    fn test_min_count_floor_overrides_byte_budget() {
        // Two 4 MB renders blow a 5 MB budget but stay, count == min.
        let lru = Lru::new(2, 10, 5 * MB);
        let a = mb_future(4);
        let b = mb_future(4);
        lru.mark_used(&a);
        lru.mark_used(&b);
        assert_eq!(lru.entry_count(), 2);
        assert_eq!(lru.size_bytes(), 8 * MB);
    }

    #[test]
    fn test_ensure_enough_space_evicts_from_lru_end() {
        let lru = Lru::new(0, 10, 10 * MB);
        let a = mb_future(4);
        let b = mb_future(4);
        lru.mark_used(&a);
        lru.mark_used(&b);

        lru.ensure_enough_space(4 * MB);
        assert_eq!(lru.entry_count(), 1);
        let entries = lru.entries.lock().unwrap();
        assert!(Arc::ptr_eq(&entries[0], &b), "oldest entry goes first");
    }

    #[test]
    fn test_ensure_enough_space_stops_at_empty() {
        let lru = Lru::new(0, 10, 10 * MB);
        let a = mb_future(4);
        lru.mark_used(&a);
        // Even an impossible request only drains the cache.
        lru.ensure_enough_space(100 * MB);
        assert_eq!(lru.entry_count(), 0);
        assert_eq!(lru.size_bytes(), 0);
    }

    #[test]
    fn test_zero_byte_budget_disables_cache() {
        let lru = Lru::new(0, 10, 0);
        let a = mb_future(1);
        lru.mark_used(&a);
        assert_eq!(lru.entry_count(), 0);
    }

    #[test]
    fn test_budget_invariant_holds_after_random_use() {
        let lru = Lru::new(2, 5, 6 * MB);
        let futures: Vec<_> = (0..8).map(|_| mb_future(1)).collect();
        for round in 0..4 {
            for (ix, future) in futures.iter().enumerate() {
                if (ix + round) % 3 != 0 {
                    lru.mark_used(future);
                }
            }
            let count = lru.entry_count();
            assert!(count <= 5);
            assert!(count <= 2 || lru.size_bytes() <= 6 * MB);
        }
    }
}
