use crate::executor::{Job, pool, run_contained};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::debug;

/// A named target for asynchronous dispatch, the seam behind
/// [`Executor::Queue`](crate::Executor::Queue).
///
/// Implement this to route jobs onto an execution context the library does
/// not know about, such as an event loop you already own. `dispatch` must
/// invoke the job exactly once and should return before the job runs.
pub trait DispatchQueue: Send + Sync {
    fn name(&self) -> &str;

    fn dispatch(&self, job: Job);
}

/// A FIFO queue draining on its own dedicated thread, one job at a time.
///
/// Dropping the last handle shuts the worker down after it drains whatever
/// was already queued.
pub struct SerialQueue {
    name: String,
    shared: Arc<QueueShared>,
}

struct QueueShared {
    jobs: Mutex<VecDeque<Job>>,
    available: Condvar,
    shutdown: AtomicBool,
}

impl SerialQueue {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        let shared = Arc::new(QueueShared {
            jobs: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        {
            let shared = shared.clone();
            thread::Builder::new()
                .name(format!("baton-queue-{name}"))
                .spawn(move || queue_loop(&shared))
                .expect("failed to spawn serial queue worker");
        }

        Arc::new(Self { name, shared })
    }
}

impl DispatchQueue for SerialQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn dispatch(&self, job: Job) {
        let mut jobs = self.shared.jobs.lock();
        jobs.push_back(job);
        self.shared.available.notify_one();
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        debug!(name = %self.name, "shutting down serial queue");
        self.shared.shutdown.store(true, Ordering::Release);
        let _jobs = self.shared.jobs.lock();
        self.shared.available.notify_one();
    }
}

fn queue_loop(shared: &QueueShared) {
    loop {
        let job = {
            let mut jobs = shared.jobs.lock();
            loop {
                if let Some(job) = jobs.pop_front() {
                    break job;
                }
                if shared.shutdown.load(Ordering::Acquire) {
                    return;
                }
                shared.available.wait(&mut jobs);
            }
        };

        run_contained(job);
    }
}

/// A named queue that admits up to `max_concurrency` jobs at a time onto
/// the background pool, holding the rest back in FIFO order.
pub struct OperationQueue {
    name: String,
    shared: Arc<OperationShared>,
}

struct OperationShared {
    inner: Mutex<OperationInner>,
    max_concurrency: usize,
}

struct OperationInner {
    pending: VecDeque<Job>,
    active: usize,
}

impl OperationQueue {
    /// A queue that admits as many jobs as the machine has cores.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let width = thread::available_parallelism().map_or(1, usize::from);
        Self::with_max_concurrency(name, width)
    }

    /// # Panics
    ///
    /// Panics when `max_concurrency` is zero.
    pub fn with_max_concurrency(name: impl Into<String>, max_concurrency: usize) -> Arc<Self> {
        assert!(max_concurrency > 0, "max_concurrency cannot be 0");
        Arc::new(Self {
            name: name.into(),
            shared: Arc::new(OperationShared {
                inner: Mutex::new(OperationInner { pending: VecDeque::new(), active: 0 }),
                max_concurrency,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_concurrency(&self) -> usize {
        self.shared.max_concurrency
    }

    /// Add a job. Runs as soon as an admission slot frees up; always
    /// asynchronous with respect to the caller.
    pub fn enqueue<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue_boxed(Box::new(job));
    }

    pub(crate) fn enqueue_boxed(&self, job: Job) {
        let mut inner = self.shared.inner.lock();
        if inner.active < self.shared.max_concurrency {
            inner.active += 1;
            drop(inner);
            let shared = self.shared.clone();
            pool::dispatch(Box::new(move || drain_slot(&shared, job)));
        } else {
            inner.pending.push_back(job);
        }
    }
}

// One admission slot: run the first job, then keep pulling queued jobs
// until none remain, and only then give the slot back.
fn drain_slot(shared: &Arc<OperationShared>, first: Job) {
    let mut job = first;
    loop {
        run_contained(job);

        let mut inner = shared.inner.lock();
        match inner.pending.pop_front() {
            Some(next) => {
                drop(inner);
                job = next;
            }
            None => {
                inner.active -= 1;
                return;
            }
        }
    }
}
