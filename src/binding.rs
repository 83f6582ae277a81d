use failure::Fail;
use fnv::{FnvHashMap, FnvHashSet};

use crate::runtime::CounterTarget;

/// Allocates the small integer binding indices counters are addressed by.
///
/// Each counter target owns its own pool of occupied indices. Targets that
/// support one counter per output stream hand out 0, 1, 2, … concurrently;
/// singular targets only ever hand out index 0, and a second acquire without
/// an intervening release is a conflict. Centralizing that policy here keeps
/// it out of every call site that begins a counter.
pub struct BindingIndexAllocator {
    occupied: FnvHashMap<CounterTarget, FnvHashSet<u32>>,
}

impl BindingIndexAllocator {
    pub fn new() -> Self {
        BindingIndexAllocator {
            occupied: FnvHashMap::default(),
        }
    }

    /// Occupies and returns the lowest free index for `target`.
    ///
    /// Fails when `target` is not indexable and an index is already held.
    pub fn acquire(&mut self, target: CounterTarget) -> Result<u32, IndexConflict> {
        let occupied = self.occupied.entry(target).or_default();

        let mut index = 0;

        while occupied.contains(&index) {
            index += 1;
        }

        if !target.is_indexable() && index > 0 {
            return Err(IndexConflict { target });
        }

        occupied.insert(index);

        Ok(index)
    }

    /// Releases an index previously returned by [BindingIndexAllocator::acquire].
    ///
    /// Releasing an index that is not occupied is a no-op.
    pub fn release(&mut self, target: CounterTarget, index: u32) {
        if let Some(occupied) = self.occupied.get_mut(&target) {
            occupied.remove(&index);
        }
    }

    /// The number of indices currently occupied for `target`.
    pub fn occupied_count(&self, target: CounterTarget) -> usize {
        self.occupied
            .get(&target)
            .map(|occupied| occupied.len())
            .unwrap_or(0)
    }
}

impl Default for BindingIndexAllocator {
    fn default() -> Self {
        BindingIndexAllocator::new()
    }
}

/// A counter target that supports only a single active index is already
/// occupied.
#[derive(Fail, Clone, Copy, PartialEq, Debug)]
#[fail(display = "target {} does not support multiple concurrent indices", target)]
pub struct IndexConflict {
    pub target: CounterTarget,
}
