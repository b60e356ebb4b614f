use std::cell::Cell;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::trace;

// Public API
mod queue;
pub use queue::{DispatchQueue, OperationQueue, SerialQueue};

// Exports
pub(crate) mod main_loop;

pub(crate) mod pool;

pub(crate) mod timer;

#[cfg(test)]
mod tests;

/// A unit of work handed to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// How many times `Executor::Default` will nest inline on one thread before
/// spilling to the background pool. Keeps deep synchronous continuation
/// chains from overflowing the stack while still letting short chains
/// collapse into plain calls.
const MAX_INLINE_DEPTH: usize = 20;

thread_local! {
    static INLINE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Where and when a job runs.
///
/// An executor is picked per continuation at attachment time; the task core
/// hands the continuation over on completion and the executor takes it from
/// there. Executors never refuse work.
#[derive(Clone, Default)]
pub enum Executor {
    /// Run inline on the calling thread. `execute` returns only after the
    /// job returned.
    Immediate,

    /// Run inline while the per-thread nesting depth stays below a bound,
    /// then fall back to the background pool.
    #[default]
    Default,

    /// Run on the designated main thread: inline when the caller is already
    /// there, otherwise enqueued onto the main runloop.
    MainThread,

    /// Asynchronous dispatch onto a named queue. `execute` returns before
    /// the job runs.
    Queue(Arc<dyn DispatchQueue>),

    /// Enqueue onto an operation queue with a concurrency ceiling.
    OperationQueue(Arc<OperationQueue>),

    /// Hand the job to a caller-supplied trampoline, which invokes it
    /// however and whenever it chooses.
    Closure(Trampoline),
}

impl Executor {
    /// An executor backed by a fresh serial queue with the given name.
    pub fn serial_queue(name: impl Into<String>) -> Executor {
        Executor::Queue(SerialQueue::new(name))
    }

    /// An executor that delegates each job to `f`.
    pub fn closure(f: impl Fn(Job) + Send + Sync + 'static) -> Executor {
        Executor::Closure(Trampoline::new(f))
    }

    /// Arrange for `job` to be invoked exactly once, per the variant's
    /// dispatch rules.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute_boxed(Box::new(job));
    }

    pub(crate) fn execute_boxed(&self, job: Job) {
        match self {
            Executor::Immediate => job(),
            Executor::Default => {
                let depth = INLINE_DEPTH.get();
                if depth < MAX_INLINE_DEPTH {
                    INLINE_DEPTH.set(depth + 1);
                    // Restore on unwind too, or a panicking job would burn
                    // the budget for the rest of the thread.
                    let _reset = DepthReset(depth);
                    job();
                } else {
                    trace!(depth, "inline budget exhausted, deferring job to pool");
                    pool::dispatch(job);
                }
            }
            Executor::MainThread => {
                if main_loop::is_main_thread() {
                    job();
                } else {
                    main_loop::dispatch(job);
                }
            }
            Executor::Queue(queue) => queue.dispatch(job),
            Executor::OperationQueue(queue) => queue.enqueue_boxed(job),
            Executor::Closure(trampoline) => trampoline.invoke(job),
        }
    }
}

struct DepthReset(usize);

impl Drop for DepthReset {
    fn drop(&mut self) {
        INLINE_DEPTH.set(self.0);
    }
}

impl fmt::Display for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Executor::Immediate => f.write_str("immediate"),
            Executor::Default => f.write_str("default"),
            Executor::MainThread => f.write_str("main-thread"),
            Executor::Queue(queue) => write!(f, "queue:{}", queue.name()),
            Executor::OperationQueue(queue) => write!(f, "operation-queue:{}", queue.name()),
            Executor::Closure(_) => f.write_str("closure"),
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Executor::Immediate => f.write_str("Immediate"),
            Executor::Default => f
                .debug_struct("Default")
                .field("max_inline_depth", &MAX_INLINE_DEPTH)
                .finish(),
            Executor::MainThread => f.write_str("MainThread"),
            Executor::Queue(queue) => f.debug_tuple("Queue").field(&queue.name()).finish(),
            Executor::OperationQueue(queue) => f
                .debug_struct("OperationQueue")
                .field("name", &queue.name())
                .field("max_concurrency", &queue.max_concurrency())
                .finish(),
            Executor::Closure(trampoline) => f.debug_tuple("Closure").field(trampoline).finish(),
        }
    }
}

/// Caller-supplied dispatch strategy for [`Executor::Closure`].
#[derive(Clone)]
pub struct Trampoline(Arc<dyn Fn(Job) + Send + Sync + 'static>);

impl Trampoline {
    pub fn new(f: impl Fn(Job) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    fn invoke(&self, job: Job) {
        (self.0)(job);
    }
}

impl fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The closure itself is not printable.
        f.debug_tuple("Trampoline").field(&"<function>").finish()
    }
}

/// Run a job on a library-owned thread, containing panics so one bad job
/// cannot take a worker down. Continuation wrappers catch their own panics
/// before they get here; this guards raw jobs submitted straight to an
/// executor.
pub(crate) fn run_contained(job: Job) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
        let detail = crate::error::panic_to_error(payload);
        tracing::error!(%detail, "job panicked on a library thread");
    }
}
