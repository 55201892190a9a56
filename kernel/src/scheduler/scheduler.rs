//! Dispatcher: selection and the CPU handoff.
//!
//! These routines assume interrupts are already masked; on a uniprocessor
//! that is the mutual-exclusion token, carried here as the exclusive borrow
//! of the [`Scheduler`]. Locks cannot be used: waiting on a contested lock
//! would call back into this scheduler and never return.
//!
//! A thread is a `Box` in exactly one container at a time (a ready band,
//! the RUNNING slot, the blocked registry, or the destruction slot), so a
//! finished thread can only be freed once, and only from the destruction
//! slot, which is drained by the *next* thread to run. The finishing thread
//! itself never frees anything: its stack is live until the switch away
//! from it completes.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;

use crate::sched_assert;
use crate::scheduler::error::{SchedulerError, SchedulerResult};
use crate::scheduler::ready_set::{Band, ReadySet};
use crate::scheduler::switch;
use crate::scheduler::thread::{alloc_thread_id, Thread, ThreadContext, ThreadId, ThreadState};
use crate::scheduler::trace::TraceSink;
use crate::time::{Alarm, TickClock};

/// Bookkeeping snapshot for debugging surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub l1_len: usize,
    pub l2_len: usize,
    pub l3_len: usize,
    pub blocked: usize,
    pub dispatches: u64,
}

pub struct Scheduler {
    ready: ReadySet,

    /// The single RUNNING slot. Occupied at all times after bootstrap.
    current: Option<Box<Thread>>,

    /// Deferred destruction: the thread that most recently finished, kept
    /// alive until the next handoff has left its stack.
    to_destroy: Option<Box<Thread>>,

    /// One-shot advisory raised when an urgent (L1/L2) thread becomes
    /// ready. The interrupt-return path consumes it.
    preempt_requested: bool,

    /// Threads parked on external events, keyed by id.
    blocked: BTreeMap<ThreadId, Box<Thread>>,

    dispatches: u64,

    clock: Arc<TickClock>,
    alarm: Arc<Alarm>,
    trace: Arc<dyn TraceSink>,
}

impl Scheduler {
    pub fn new(clock: Arc<TickClock>, alarm: Arc<Alarm>, trace: Arc<dyn TraceSink>) -> Self {
        Self {
            ready: ReadySet::new(),
            current: None,
            to_destroy: None,
            preempt_requested: false,
            blocked: BTreeMap::new(),
            dispatches: 0,
            clock,
            alarm,
            trace,
        }
    }

    /// Install the boot thread directly into the RUNNING slot. Called once
    /// at kernel init, before the first dispatch.
    pub fn install_bootstrap(&mut self, mut thread: Box<Thread>) {
        sched_assert!(self.current.is_none(), "bootstrap into an occupied RUNNING slot");
        thread.set_state(ThreadState::Running);
        log::debug!("bootstrap thread '{}' ({})", thread.name(), thread.id());
        self.current = Some(thread);
    }

    /// Create a kernel thread and mark it ready.
    pub fn spawn(
        &mut self,
        name: &str,
        priority: i32,
        entry: fn() -> !,
        stack_size: usize,
    ) -> SchedulerResult<ThreadId> {
        let id = alloc_thread_id();
        let thread = Box::new(Thread::new_kernel(id, name, priority, entry, stack_size)?);
        log::debug!("spawned thread '{}' ({})", name, id);
        self.mark_ready(thread);
        Ok(id)
    }

    /// Mark a thread runnable and put it in the band its priority selects.
    ///
    /// Two side effects ride along. A foreign thread contesting the CPU
    /// refreshes the running thread's burst estimate (half the burst in
    /// progress, half the old estimate), even if the running thread never
    /// yields. And an insertion into L1 or L2 raises the one-shot
    /// preemption request; L3 insertions never do, L3 progress rides on
    /// the periodic timer instead.
    ///
    /// Never blocks.
    pub fn mark_ready(&mut self, mut thread: Box<Thread>) {
        if let Some(current) = self.current.as_mut() {
            current.decay_burst();
        }

        thread.set_state(ThreadState::Ready);
        log::debug!("ready: thread '{}' ({})", thread.name(), thread.id());

        let band = self.enqueue(thread);
        if band != Band::L3 {
            self.preempt_requested = true;
        }
    }

    /// Insert into the ready set and emit the insertion trace line.
    fn enqueue(&mut self, thread: Box<Thread>) -> Band {
        let id = thread.id();
        let band = self.ready.insert(thread);
        self.trace.line(format_args!(
            "Tick {}: Thread {} is inserted into queue {}",
            self.clock.current_tick(),
            id,
            band
        ));
        band
    }

    /// The thread `select_next` would return, without removing it.
    pub fn peek_next(&self) -> Option<&Thread> {
        self.ready.peek()
    }

    /// Remove and return the next thread to run, by strict band priority:
    /// L1, else L2, else L3, else `None` (idling is the caller's concern).
    ///
    /// Side effect: periodic time-slicing is delegated to the timer iff the
    /// selection came from L3. L1/L2 threads run until they block, finish,
    /// or the preemption signal displaces them, never on a quantum.
    pub fn select_next(&mut self) -> Option<Box<Thread>> {
        let (thread, band) = self.ready.take_next()?;
        self.alarm.set_periodic_preemption(band == Band::L3);
        self.trace.line(format_args!(
            "Tick {}: Thread {} is removed from queue {}",
            self.clock.current_tick(),
            thread.id(),
            band
        ));
        Some(thread)
    }

    /// Read and clear the one-shot preemption request.
    pub fn take_preempt_request(&mut self) -> bool {
        core::mem::take(&mut self.preempt_requested)
    }

    pub fn preempt_requested(&self) -> bool {
        self.preempt_requested
    }

    pub fn current_thread_id(&self) -> Option<ThreadId> {
        self.current.as_ref().map(|thread| thread.id())
    }

    /// Run `f` against the RUNNING thread, if any. This is how the timer
    /// path charges burst ticks, and how yield/block paths demote the
    /// running thread's state before dispatching.
    pub fn with_current<F, R>(&mut self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Thread) -> R,
    {
        self.current.as_mut().map(|thread| f(thread))
    }

    /// Hand the CPU to `next`.
    ///
    /// The one operation with suspend/resume control flow: the calling
    /// thread's own execution stops at the context switch inside this call,
    /// and the call only returns, into this same activation, when a future
    /// dispatch selects this thread again.
    ///
    /// The caller has already demoted the outgoing thread's state (READY
    /// for a yield, BLOCKED for a wait) unless `finishing` is set, in which
    /// case the outgoing thread is parked for deferred destruction: it must
    /// not be freed here, its stack is in use until the switch completes.
    /// The *next* thread to get CPU time performs the destruction, on
    /// resumption (or, for a fresh thread, via [`Scheduler::reclaim_finished`]
    /// from its entry trampoline).
    pub fn dispatch(&mut self, mut next: Box<Thread>, finishing: bool) {
        sched_assert!(self.current.is_some(), "dispatch with an empty RUNNING slot");
        let mut old = self.current.take().unwrap();

        if finishing {
            sched_assert!(
                self.to_destroy.is_none(),
                "finishing dispatch while a reclaim is pending"
            );
            old.set_state(ThreadState::Finished);
        }

        old.save_user_state();
        sched_assert!(old.stack_intact(), "stack overflow on outgoing thread");

        next.set_state(ThreadState::Running);
        let now = self.clock.current_tick();
        old.set_last_dispatch_tick(now);
        next.reset_burst_ticks();

        let old_id = old.id();
        let old_burst = old.burst_ticks();
        let next_id = next.id();
        let old_ctx: *mut ThreadContext = old.context_ptr();
        let new_ctx: *const ThreadContext = next.context_ptr();

        log::debug!("switching from '{}' to '{}'", old.name(), next.name());

        // Route the displaced thread to its owner. A requeue is not a
        // contested insertion: no aging, no preemption signal.
        match old.state() {
            ThreadState::Finished => self.to_destroy = Some(old),
            ThreadState::Ready => {
                self.enqueue(old);
            }
            ThreadState::Blocked => {
                self.blocked.insert(old_id, old);
            }
            ThreadState::Running => {
                sched_assert!(false, "outgoing thread still RUNNING");
            }
        }

        self.current = Some(next);
        self.dispatches += 1;

        self.trace.line(format_args!(
            "Tick {}: Thread {} is now selected for execution",
            now, next_id
        ));
        self.trace.line(format_args!(
            "Tick {}: Thread {} is replaced, and it has executed {} ticks",
            now, old_id, old_burst
        ));

        // The handoff. Execution of the calling thread stops here.
        unsafe {
            switch::context_switch(old_ctx, new_ctx);
        }

        // Running again, interrupts still masked by whoever resumed us.
        // Reclaim whichever thread finished last on this CPU, not
        // necessarily the one this activation parked.
        self.reclaim_finished();
        if let Some(current) = self.current.as_mut() {
            current.restore_user_state();
        }
    }

    /// Destroy the thread parked for destruction, if any. Runs in the
    /// resumption half of every handoff; a freshly created thread has no
    /// activation to resume into, so its entry trampoline calls this first.
    pub fn reclaim_finished(&mut self) {
        if let Some(dead) = self.to_destroy.take() {
            log::debug!("reclaiming finished thread '{}' ({})", dead.name(), dead.id());
            drop(dead);
        }
    }

    /// Id of the thread awaiting destruction, if any.
    pub fn pending_destruction(&self) -> Option<ThreadId> {
        self.to_destroy.as_ref().map(|thread| thread.id())
    }

    /// Wake a blocked thread: BLOCKED → READY through the normal insertion
    /// path, so aging and the preemption signal apply.
    pub fn wake(&mut self, id: ThreadId) -> SchedulerResult<()> {
        let thread = self
            .blocked
            .remove(&id)
            .ok_or(SchedulerError::ThreadNotFound { thread_id: id })?;
        self.mark_ready(thread);
        Ok(())
    }

    pub fn stats(&self) -> SchedulerStats {
        let (l1_len, l2_len, l3_len) = self.ready.lengths();
        SchedulerStats {
            l1_len,
            l2_len,
            l3_len,
            blocked: self.blocked.len(),
            dispatches: self.dispatches,
        }
    }
}
