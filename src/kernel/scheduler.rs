// Slice handles and the partition rule that assigns them to workers.
//
// Slot index is the display order; archive listing order is not trusted.
// Worker k owns every slot with slot % n == k and visits them in
// increasing order, so each worker's request sequence is monotonic.

use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SliceHandle {
    /// Opaque archive instance identifier.
    pub instance: String,
    /// 1-based display position.
    pub slot: u32,
}

impl SliceHandle {
    pub fn new(instance: impl Into<String>, slot: u32) -> Self {
        Self {
            instance: instance.into(),
            slot,
        }
    }
}

impl fmt::Display for SliceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {} ({})", self.slot, self.instance)
    }
}

/// Which worker owns `slot` when there are `workers` partitions.
#[inline]
pub const fn owner(slot: u32, workers: usize) -> usize {
    slot as usize % workers
}

/// Split `handles` into `workers` disjoint groups by `slot % workers`,
/// each sorted by slot. Group k is worker k's queue; groups may be empty.
/// A slot listed twice keeps its first handle.
pub fn partition(handles: &[SliceHandle], workers: usize) -> Vec<Vec<SliceHandle>> {
    let workers = workers.max(1);
    let mut groups: Vec<Vec<SliceHandle>> = vec![Vec::new(); workers];
    for handle in handles {
        let group = &mut groups[owner(handle.slot, workers)];
        if group.iter().any(|h| h.slot == handle.slot) {
            log::warn!("prefetch: duplicate {}, keeping the first", handle);
            continue;
        }
        group.push(handle.clone());
    }
    for group in &mut groups {
        group.sort_by_key(|h| h.slot);
    }
    groups
}

/// Sort by slot and drop repeated slots, first one wins.
pub fn display_order(handles: &[SliceHandle]) -> Vec<SliceHandle> {
    let mut ordered: Vec<SliceHandle> = Vec::with_capacity(handles.len());
    for handle in handles {
        if !ordered.iter().any(|h| h.slot == handle.slot) {
            ordered.push(handle.clone());
        }
    }
    ordered.sort_by_key(|h| h.slot);
    ordered
}
