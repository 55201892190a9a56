//! Kernel heap handle for the freestanding target.
//!
//! Hosted builds (the unit-test harness) use the host allocator instead.

use linked_list_allocator::LockedHeap;

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Hand the allocator its backing region. Called once by the boot path
/// before the first allocation.
///
/// # Safety
/// `start..start + size` must be unused, writable memory, and must never be
/// handed out again.
pub unsafe fn init(start: usize, size: usize) {
    ALLOCATOR.lock().init(start as *mut u8, size);
}
