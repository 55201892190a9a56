//! Thread control block.

use alloc::boxed::Box;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::memory::address_space::USER_REG_COUNT;
use crate::memory::AddressSpace;
use crate::scheduler::error::SchedulerResult;
use crate::scheduler::switch;
use crate::scheduler::thread::stack::Stack;
use crate::scheduler::thread::state::ThreadState;

/// Thread ID type.
pub type ThreadId = u64;

/// Saved machine context. `repr(C)` with RSP first: the switch routine
/// addresses the saved stack pointer through the struct's base address.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ThreadContext {
    pub rsp: u64,
    pub rip: u64,
    pub rflags: u64,
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
}

impl ThreadContext {
    pub const fn empty() -> Self {
        Self {
            rsp: 0,
            rip: 0,
            rflags: 0,
            rax: 0,
            rbx: 0,
            rcx: 0,
            rdx: 0,
            rbp: 0,
            rdi: 0,
            rsi: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
        }
    }

    /// The user-visible general-purpose registers, in snapshot order.
    pub(crate) fn general_regs(&self) -> [u64; USER_REG_COUNT] {
        [
            self.rax, self.rbx, self.rcx, self.rdx, self.rbp, self.rdi, self.rsi, self.r8,
            self.r9, self.r10, self.r11, self.r12, self.r13, self.r14, self.r15,
        ]
    }

    pub(crate) fn set_general_regs(&mut self, regs: &[u64; USER_REG_COUNT]) {
        let [rax, rbx, rcx, rdx, rbp, rdi, rsi, r8, r9, r10, r11, r12, r13, r14, r15] = *regs;
        self.rax = rax;
        self.rbx = rbx;
        self.rcx = rcx;
        self.rdx = rdx;
        self.rbp = rbp;
        self.rdi = rdi;
        self.rsi = rsi;
        self.r8 = r8;
        self.r9 = r9;
        self.r10 = r10;
        self.r11 = r11;
        self.r12 = r12;
        self.r13 = r13;
        self.r14 = r14;
        self.r15 = r15;
    }
}

/// A schedulable thread.
///
/// Owned by exactly one container at any time: a ready band, the RUNNING
/// slot, the blocked registry, or the destruction slot. Dropping the box
/// releases the stack and any address space.
pub struct Thread {
    id: ThreadId,
    name: Box<str>,
    priority: i32,
    state: ThreadState,

    /// Decayed estimate of recent CPU consumption; the L1 ordering key.
    recent_burst: u64,

    /// Ticks consumed since this thread was last dispatched.
    burst_ticks: u64,

    /// Tick stamp of the last handoff away from this thread.
    last_dispatch_tick: u64,

    /// Saved machine state; only the switch primitive interprets it.
    context: ThreadContext,

    stack: Stack,

    /// Present only on user-mode threads.
    address_space: Option<AddressSpace>,
}

impl Thread {
    /// Create a kernel thread whose first activation enters `entry`.
    pub fn new_kernel(
        id: ThreadId,
        name: &str,
        priority: i32,
        entry: fn() -> !,
        stack_size: usize,
    ) -> SchedulerResult<Self> {
        let stack = Stack::new(stack_size)?;
        let mut context = ThreadContext::empty();
        unsafe {
            switch::init_context(&mut context, stack.top().as_u64(), entry as usize as u64);
        }

        Ok(Self {
            id,
            name: name.into(),
            priority,
            state: ThreadState::Ready,
            recent_burst: 0,
            burst_ticks: 0,
            last_dispatch_tick: 0,
            context,
            stack,
            address_space: None,
        })
    }

    /// Create a user thread owning an address space.
    pub fn new_user(
        id: ThreadId,
        name: &str,
        priority: i32,
        entry: fn() -> !,
        stack_size: usize,
        space: AddressSpace,
    ) -> SchedulerResult<Self> {
        let mut thread = Self::new_kernel(id, name, priority, entry, stack_size)?;
        thread.address_space = Some(space);
        Ok(thread)
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    pub fn set_state(&mut self, state: ThreadState) {
        debug_assert!(
            self.state.can_transition_to(state),
            "illegal thread state transition"
        );
        self.state = state;
    }

    pub fn recent_burst(&self) -> u64 {
        self.recent_burst
    }

    pub fn set_recent_burst(&mut self, estimate: u64) {
        self.recent_burst = estimate;
    }

    /// Fold the burst in progress into the decayed estimate: half the ticks
    /// consumed since the last dispatch, half the previous estimate.
    pub fn decay_burst(&mut self) {
        self.recent_burst = self.burst_ticks / 2 + self.recent_burst / 2;
    }

    pub fn burst_ticks(&self) -> u64 {
        self.burst_ticks
    }

    /// Timer-path accounting: ticks consumed while running.
    pub fn add_burst_ticks(&mut self, ticks: u64) {
        self.burst_ticks += ticks;
    }

    pub fn reset_burst_ticks(&mut self) {
        self.burst_ticks = 0;
    }

    pub fn last_dispatch_tick(&self) -> u64 {
        self.last_dispatch_tick
    }

    pub fn set_last_dispatch_tick(&mut self, tick: u64) {
        self.last_dispatch_tick = tick;
    }

    pub fn has_address_space(&self) -> bool {
        self.address_space.is_some()
    }

    pub fn address_space(&self) -> Option<&AddressSpace> {
        self.address_space.as_ref()
    }

    /// Park user-visible state in the address space before switching out.
    pub fn save_user_state(&mut self) {
        if let Some(space) = self.address_space.as_mut() {
            space.save_user_state(&self.context);
            space.save_state();
        }
    }

    /// Reload user-visible state after the CPU returns to this thread.
    pub fn restore_user_state(&mut self) {
        if let Some(space) = self.address_space.as_mut() {
            space.restore_user_state(&mut self.context);
            space.restore_state();
        }
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Outgoing-thread guard; a false return is fatal upstream.
    pub fn stack_intact(&self) -> bool {
        self.stack.intact()
    }

    pub fn context(&self) -> &ThreadContext {
        &self.context
    }

    /// Raw pointer handed to the switch primitive. The heap slot behind the
    /// box is stable while any scheduler container owns the thread.
    pub fn context_ptr(&mut self) -> *mut ThreadContext {
        &mut self.context
    }
}

/// Global thread-id allocator.
static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

pub fn alloc_thread_id() -> ThreadId {
    NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::thread::stack::DEFAULT_STACK_SIZE;

    fn never() -> ! {
        unreachable!()
    }

    #[test]
    fn new_kernel_seeds_context_on_its_stack() {
        let thread = Thread::new_kernel(1, "init", 40, never, DEFAULT_STACK_SIZE).unwrap();
        assert_eq!(thread.state(), ThreadState::Ready);
        assert_eq!(thread.context().rip, never as usize as u64);
        let rsp = thread.context().rsp;
        assert!(rsp > thread.stack().base().as_u64());
        assert!(rsp <= thread.stack().top().as_u64());
    }

    #[test]
    fn decay_halves_and_sums() {
        let mut thread = Thread::new_kernel(2, "t", 120, never, DEFAULT_STACK_SIZE).unwrap();
        thread.add_burst_ticks(10);
        thread.set_recent_burst(6);
        thread.decay_burst();
        assert_eq!(thread.recent_burst(), 8);

        // integer halves truncate
        thread.reset_burst_ticks();
        thread.add_burst_ticks(3);
        thread.set_recent_burst(5);
        thread.decay_burst();
        assert_eq!(thread.recent_burst(), 3);
    }

    #[test]
    fn burst_accounting() {
        let mut thread = Thread::new_kernel(3, "t", 10, never, DEFAULT_STACK_SIZE).unwrap();
        thread.add_burst_ticks(4);
        thread.add_burst_ticks(2);
        assert_eq!(thread.burst_ticks(), 6);
        thread.reset_burst_ticks();
        assert_eq!(thread.burst_ticks(), 0);
    }

    #[test]
    fn ids_are_unique() {
        let a = alloc_thread_id();
        let b = alloc_thread_id();
        assert_ne!(a, b);
    }

    #[test]
    #[should_panic(expected = "illegal thread state transition")]
    fn illegal_transition_is_caught() {
        let mut thread = Thread::new_kernel(4, "t", 10, never, DEFAULT_STACK_SIZE).unwrap();
        thread.set_state(ThreadState::Running);
        thread.set_state(ThreadState::Finished);
        thread.set_state(ThreadState::Ready);
    }
}
