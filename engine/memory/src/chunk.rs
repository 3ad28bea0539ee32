//! Ordered free-list chunk allocator.
//!
//! One instance manages a single `[base, base + size)` byte range: a
//! physical pool (per core and memory kind) or a scratch child's slice of
//! ESRAM. Offsets handed out are absolute within the range's address
//! space, not relative to `base`.
//!
//! The free list is kept sorted and coalesced. Alloc is first-fit; the
//! extra entry points (`alloc_at`, `resize`) exist for the scratch-domain
//! reservation, which must claim and reshape an exact range.

use std::collections::BTreeMap;

/// Snapshot of an allocator's occupancy, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocStatus {
    /// Base offset of the managed range.
    pub base: u32,
    /// Total managed bytes.
    pub total: u32,
    /// Bytes currently allocated.
    pub used: u32,
    /// Bytes currently free.
    pub free: u32,
    /// Number of live allocations.
    pub blocks: usize,
}

/// Align `value` up to the next multiple of `align` (a power of two).
pub const fn align_up(value: u32, align: u32) -> u32 {
    (value + align - 1) & !(align - 1)
}

/// First-fit free-list allocator over one byte range.
#[derive(Debug, Clone)]
pub struct ChunkAllocator {
    base: u32,
    size: u32,
    /// Sorted, coalesced free ranges as half-open `(start, end)` pairs.
    free: Vec<(u32, u32)>,
    /// Live allocations: start offset -> length.
    used: BTreeMap<u32, u32>,
}

impl ChunkAllocator {
    pub fn new(base: u32, size: u32) -> Self {
        let free = if size > 0 { vec![(base, base + size)] } else { Vec::new() };
        Self {
            base,
            size,
            free,
            used: BTreeMap::new(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Whether `start` is the beginning of a live allocation.
    pub fn is_allocated(&self, start: u32) -> bool {
        self.used.contains_key(&start)
    }

    /// Total bytes currently allocated.
    pub fn used_bytes(&self) -> u32 {
        self.used.values().sum()
    }

    pub fn status(&self) -> AllocStatus {
        let used = self.used_bytes();
        AllocStatus {
            base: self.base,
            total: self.size,
            used,
            free: self.size - used,
            blocks: self.used.len(),
        }
    }

    /// Allocate `size` bytes aligned to `align` anywhere in the range.
    pub fn alloc(&mut self, size: u32, align: u32) -> Option<u32> {
        self.alloc_in(size, align, self.base, self.base + self.size)
    }

    /// Allocate `size` bytes aligned to `align` inside `[lo, hi)`.
    ///
    /// Used by the domain layer to confine allocations to a domain's
    /// declared segment window.
    pub fn alloc_in(&mut self, size: u32, align: u32, lo: u32, hi: u32) -> Option<u32> {
        if size == 0 || !align.is_power_of_two() {
            return None;
        }
        for i in 0..self.free.len() {
            let (start, end) = self.free[i];
            let start = start.max(lo);
            let end = end.min(hi);
            if start >= end {
                continue;
            }
            let aligned = align_up(start, align);
            match aligned.checked_add(size) {
                Some(alloc_end) if alloc_end <= end => {
                    self.claim(aligned, size);
                    return Some(aligned);
                }
                _ => continue,
            }
        }
        None
    }

    /// Claim the exact range `[start, start + size)` if it is entirely free.
    pub fn alloc_at(&mut self, start: u32, size: u32) -> bool {
        if size == 0 {
            return false;
        }
        let end = match start.checked_add(size) {
            Some(end) => end,
            None => return false,
        };
        let covered = self
            .free
            .iter()
            .any(|&(fs, fe)| fs <= start && end <= fe);
        if !covered {
            return false;
        }
        self.claim(start, size);
        true
    }

    /// Release the allocation starting at `start`.
    ///
    /// Freeing an offset that is not a live allocation is a programming
    /// error; it is reported (and debug-asserted) rather than corrupting
    /// the free list.
    pub fn free(&mut self, start: u32) -> bool {
        let Some(len) = self.used.remove(&start) else {
            debug_assert!(false, "free of unknown offset {start:#x}");
            return false;
        };
        self.insert_free(start, start + len);
        true
    }

    /// Reshape the allocation at `start` into `[new_start, new_start + new_size)`.
    ///
    /// The old range is released first, so grow/shrink into adjacent free
    /// space works in place. On failure the old allocation is restored and
    /// `false` is returned.
    pub fn resize(&mut self, start: u32, new_start: u32, new_size: u32) -> bool {
        let Some(old_len) = self.used.remove(&start) else {
            debug_assert!(false, "resize of unknown offset {start:#x}");
            return false;
        };
        self.insert_free(start, start + old_len);
        if self.alloc_at(new_start, new_size) {
            return true;
        }
        // Roll back: the old range is still free, so this cannot fail.
        let restored = self.alloc_at(start, old_len);
        debug_assert!(restored);
        false
    }

    fn claim(&mut self, start: u32, size: u32) {
        let end = start + size;
        for i in 0..self.free.len() {
            let (fs, fe) = self.free[i];
            if fs <= start && end <= fe {
                self.free.remove(i);
                if fs < start {
                    self.free.insert(i, (fs, start));
                }
                if end < fe {
                    let at = if fs < start { i + 1 } else { i };
                    self.free.insert(at, (end, fe));
                }
                self.used.insert(start, size);
                return;
            }
        }
        unreachable!("claim of a non-free range");
    }

    fn insert_free(&mut self, start: u32, end: u32) {
        let pos = self
            .free
            .iter()
            .position(|&(fs, _)| fs > start)
            .unwrap_or(self.free.len());
        self.free.insert(pos, (start, end));
        // Coalesce with neighbours.
        if pos + 1 < self.free.len() && self.free[pos].1 == self.free[pos + 1].0 {
            self.free[pos].1 = self.free[pos + 1].1;
            self.free.remove(pos + 1);
        }
        if pos > 0 && self.free[pos - 1].1 == self.free[pos].0 {
            self.free[pos - 1].1 = self.free[pos].1;
            self.free.remove(pos);
        }
    }
}
