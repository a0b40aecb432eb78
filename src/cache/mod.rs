//! Gram-row cache
//!
//! Keeps partially filled kernel matrix rows in an LRU keyed by the row's
//! current position in the solver. A row may be shorter than the problem:
//! only the first `len` columns requested so far are valid. Rows are evicted
//! least recently used first once the byte budget would be exceeded.

use lru::LruCache;
use std::mem::size_of;

const ENTRY_BYTES: usize = size_of::<f64>();

/// LRU cache of kernel matrix rows under a byte budget
pub struct KernelCache {
    rows: LruCache<usize, Vec<f64>>,
    budget_bytes: usize,
    used_bytes: usize,
    hits: u64,
    misses: u64,
}

impl KernelCache {
    /// Create a cache holding at most `budget_bytes` of row data.
    ///
    /// The most recently requested row is always kept, even when it alone
    /// exceeds the budget.
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            rows: LruCache::unbounded(),
            budget_bytes,
            used_bytes: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Create a cache from a budget in megabytes
    pub fn with_megabytes(megabytes: f64) -> Self {
        Self::new((megabytes.max(0.0) * (1 << 20) as f64) as usize)
    }

    /// Fetch the first `len` entries of row `i`.
    ///
    /// Returns the row slice and the number of leading entries that were
    /// already valid. Entries from that position up to `len` are zero and
    /// must be filled in by the caller.
    pub fn get_data(&mut self, i: usize, len: usize) -> (&mut [f64], usize) {
        let mut row = self.rows.pop(&i).unwrap_or_default();
        let start = row.len();

        if start >= len {
            self.hits += 1;
        } else {
            self.misses += 1;
            self.used_bytes -= start * ENTRY_BYTES;
            while self.used_bytes + len * ENTRY_BYTES > self.budget_bytes {
                match self.rows.pop_lru() {
                    Some((_, old)) => self.used_bytes -= old.len() * ENTRY_BYTES,
                    None => break,
                }
            }
            row.resize(len, 0.0);
            self.used_bytes += len * ENTRY_BYTES;
        }

        let row = self.rows.get_or_insert_mut(i, move || row);
        (&mut row[..len], start.min(len))
    }

    /// Follow a position swap of samples `i` and `j` in the solver.
    ///
    /// Whole rows change keys without copying; inside every other row the two
    /// columns are swapped, and rows holding only one of the two columns are
    /// dropped.
    pub fn swap_index(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }

        let row_i = self.rows.pop(&i);
        let row_j = self.rows.pop(&j);
        if let Some(row) = row_i {
            self.rows.put(j, row);
        }
        if let Some(row) = row_j {
            self.rows.put(i, row);
        }

        let (lo, hi) = (i.min(j), i.max(j));
        let mut stale = Vec::new();
        for (&key, row) in self.rows.iter_mut() {
            if row.len() > hi {
                row.swap(lo, hi);
            } else if row.len() > lo {
                stale.push(key);
            }
        }
        for key in stale {
            if let Some(row) = self.rows.pop(&key) {
                self.used_bytes -= row.len() * ENTRY_BYTES;
            }
        }
    }

    /// Get cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity_bytes: self.budget_bytes,
            used_bytes: self.used_bytes,
            rows: self.rows.len(),
        }
    }

    /// Clear the cache
    pub fn clear(&mut self) {
        self.rows.clear();
        self.used_bytes = 0;
        self.hits = 0;
        self.misses = 0;
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub capacity_bytes: usize,
    pub used_bytes: usize,
    pub rows: usize,
}
