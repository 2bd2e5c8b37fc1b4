//! Small containers and helpers shared by the context layer

mod slot_allocator;

pub use slot_allocator::SlotAllocator;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked
///
/// Context bookkeeping stays consistent across a panic in a caller, so a
/// poisoned lock is not treated as fatal.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Round `value` up to a multiple of `alignment` (a power of two)
pub(crate) fn align_up(value: u32, alignment: u32) -> u32 {
    debug_assert!(alignment.is_power_of_two());
    value.saturating_add(alignment - 1) & !(alignment - 1)
}
