//! Scheduler error types and fatal asserts.

use core::fmt;

/// Errors from the fallible scheduler paths. Contract violations are not
/// errors; those abort through [`sched_assert!`](crate::sched_assert).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// Stack allocation failed for a new thread.
    StackAllocationFailed { size: usize },

    /// Thread not found in the blocked registry.
    ThreadNotFound { thread_id: u64 },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackAllocationFailed { size } => {
                write!(f, "stack allocation failed ({} bytes)", size)
            }
            Self::ThreadNotFound { thread_id } => {
                write!(f, "thread {} not found", thread_id)
            }
        }
    }
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Abort the kernel on a broken scheduler invariant. Every use marks a
/// caller contract breach, never a recoverable runtime condition.
#[macro_export]
macro_rules! sched_assert {
    ($cond:expr, $reason:expr) => {
        if !$cond {
            panic!("[SCHED] invariant violated: {}", $reason);
        }
    };
}
