//! Thread dispatch subsystem.
//!
//! Three-band ready set with priority aging, and the dispatcher that hands
//! the CPU between threads. Callers enter every operation with interrupts
//! masked; on a uniprocessor the exclusive borrow of the [`Scheduler`] is
//! that token. Nothing here ever waits on a contested resource, since
//! waiting would recurse into this same scheduler.

pub mod error;
pub mod ready_set;
pub mod scheduler;
pub mod switch;
pub mod thread;
pub mod trace;

// Re-exports
pub use error::{SchedulerError, SchedulerResult};
pub use ready_set::{Band, ReadySet};
pub use scheduler::{Scheduler, SchedulerStats};
pub use thread::{alloc_thread_id, Thread, ThreadContext, ThreadId, ThreadState};
pub use trace::{NullSink, TraceSink, WriterSink};
