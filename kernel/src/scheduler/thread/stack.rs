//! Kernel thread stacks.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::memory::VirtualAddress;
use crate::scheduler::error::{SchedulerError, SchedulerResult};
use crate::sched_assert;

/// Default kernel stack size (16 KiB).
pub const DEFAULT_STACK_SIZE: usize = 16 * 1024;

/// Smallest stack this core will hand out.
pub const MIN_STACK_SIZE: usize = 4096;

/// Fencepost word planted at the low end of every stack. Stacks grow down;
/// a clobbered fencepost means the thread ran past its allocation.
const STACK_FENCEPOST: [u8; 8] = 0xdead_beef_cafe_f00d_u64.to_le_bytes();

/// An owned thread stack. Dropping the owning thread frees it.
pub struct Stack {
    buf: Box<[u8]>,
}

impl Stack {
    /// Allocate a zeroed stack and plant the fencepost.
    pub fn new(size: usize) -> SchedulerResult<Self> {
        sched_assert!(size >= MIN_STACK_SIZE, "thread stack below minimum size");

        // try_reserve so allocation pressure surfaces as an error instead of
        // aborting inside the scheduler.
        let mut buf = Vec::new();
        buf.try_reserve_exact(size)
            .map_err(|_| SchedulerError::StackAllocationFailed { size })?;
        buf.resize(size, 0);

        let mut stack = Self {
            buf: buf.into_boxed_slice(),
        };
        stack.buf[..STACK_FENCEPOST.len()].copy_from_slice(&STACK_FENCEPOST);
        Ok(stack)
    }

    /// Lowest address of the allocation.
    pub fn base(&self) -> VirtualAddress {
        VirtualAddress::new(self.buf.as_ptr() as usize)
    }

    /// Initial stack pointer: the high end, rounded down to the 16-byte ABI
    /// alignment.
    pub fn top(&self) -> VirtualAddress {
        VirtualAddress::new((self.buf.as_ptr() as usize + self.buf.len()) & !0xf)
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    /// Whether the fencepost is still in place.
    pub fn intact(&self) -> bool {
        self.buf[..STACK_FENCEPOST.len()] == STACK_FENCEPOST
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_stack_is_intact() {
        let stack = Stack::new(DEFAULT_STACK_SIZE).unwrap();
        assert_eq!(stack.size(), DEFAULT_STACK_SIZE);
        assert!(stack.intact());
        assert!(stack.top().value() > stack.base().value());
        assert_eq!(stack.top().value() % 16, 0);
    }

    #[test]
    fn clobbered_fencepost_is_detected() {
        let mut stack = Stack::new(MIN_STACK_SIZE).unwrap();
        stack.buf[0] = 0;
        assert!(!stack.intact());
    }

    #[test]
    #[should_panic(expected = "below minimum size")]
    fn undersized_stack_aborts() {
        let _ = Stack::new(128);
    }
}
