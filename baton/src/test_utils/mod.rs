use crate::executor::{Executor, Job, Trampoline};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

/// Records every job routed through [`executor`](Self::executor): arrival
/// order and the thread that invoked it. The spy runs each job inline so
/// tests stay deterministic.
pub(crate) struct DispatchTracker {
    dispatches: DashMap<usize, ThreadId>,
    next: AtomicUsize,
}

impl DispatchTracker {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            dispatches: DashMap::new(),
            next: AtomicUsize::new(0),
        })
    }

    /// An executor that records each job, then invokes it on the calling
    /// thread.
    pub(crate) fn executor(self: &Arc<Self>) -> Executor {
        let tracker = self.clone();
        Executor::Closure(Trampoline::new(move |job: Job| {
            let seq = tracker.next.fetch_add(1, Ordering::Relaxed);
            tracker.dispatches.insert(seq, thread::current().id());
            job();
        }))
    }

    pub(crate) fn count(&self) -> usize {
        self.dispatches.len()
    }

    pub(crate) fn distinct_threads(&self) -> usize {
        let threads: HashSet<ThreadId> = self.dispatches.iter().map(|entry| *entry.value()).collect();
        threads.len()
    }
}
