use std::collections::BTreeSet;

/// Allocates and recycles arena indices.
///
/// Backs the GPU context arena: an index handed out here is a
/// `GpuContextHandle`. Freed indices are recycled lowest-first, and only
/// after the owner has cleared the slot and called [`SlotAllocator::free`].
///
/// # Example
///
/// ```ignore
/// let mut alloc = SlotAllocator::new();
/// let a = alloc.alloc();  // 0
/// let b = alloc.alloc();  // 1
/// alloc.free(a);          // 0 is now available
/// let c = alloc.alloc();  // 0 (recycled)
/// ```
#[derive(Debug)]
pub struct SlotAllocator {
    free_slots: BTreeSet<u32>,
    next_id: u32,
    len: u32,
}

impl SlotAllocator {
    /// Create a new empty allocator
    pub fn new() -> Self {
        Self {
            free_slots: BTreeSet::new(),
            next_id: 0,
            len: 0,
        }
    }

    /// Allocate the lowest available slot index
    pub fn alloc(&mut self) -> u32 {
        self.len += 1;
        self.free_slots.pop_first().unwrap_or_else(|| {
            let id = self.next_id;
            self.next_id += 1;
            id
        })
    }

    /// Return a slot index to the pool for reuse
    ///
    /// Returns false (and changes nothing) for an index that was never
    /// allocated or is already free.
    pub fn free(&mut self, id: u32) -> bool {
        if id >= self.next_id || !self.free_slots.insert(id) {
            return false;
        }
        self.len -= 1;
        true
    }

    /// Whether `id` is currently allocated
    pub fn is_allocated(&self, id: u32) -> bool {
        id < self.next_id && !self.free_slots.contains(&id)
    }

    /// Highest index ever allocated + 1.
    ///
    /// The arena backing these indices must have at least this many slots.
    pub fn high_water_mark(&self) -> u32 {
        self.next_id
    }

    /// Number of currently allocated slots
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether no slots are currently allocated
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for SlotAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "slot_allocator_tests.rs"]
mod tests;
