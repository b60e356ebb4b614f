use super::*;
use crate::task::TaskSource;
use crate::test_utils::DispatchTracker;
use parking_lot::Mutex;
use rstest::rstest;
use static_assertions::assert_impl_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use std::time::Duration;

assert_impl_all!(Executor: Send, Sync, Clone);
assert_impl_all!(Trampoline: Send, Sync, Clone);

#[test]
fn test_immediate_returns_only_after_the_job_ran() {
    let log = Arc::new(Mutex::new(Vec::new()));

    log.lock().push("before");
    Executor::Immediate.execute({
        let log = log.clone();
        move || log.lock().push("job")
    });
    log.lock().push("after");

    assert_eq!(*log.lock(), vec!["before", "job", "after"]);
}

#[test]
fn test_default_runs_inline_at_shallow_depth() {
    let ran = Arc::new(AtomicBool::new(false));
    Executor::Default.execute({
        let ran = ran.clone();
        move || ran.store(true, Ordering::SeqCst)
    });

    assert!(ran.load(Ordering::SeqCst));
}

// Thirty nested submissions: the first twenty stay inline on the caller,
// the rest spill to the pool and continue there.
#[test]
fn test_default_spills_to_pool_beyond_depth_limit() {
    const TOTAL: usize = 30;

    fn nested(level: usize, log: Arc<Mutex<Vec<ThreadId>>>, done: Arc<TaskSource<()>>) {
        Executor::Default.execute(move || {
            log.lock().push(thread::current().id());
            if level + 1 < TOTAL {
                nested(level + 1, log, done);
            } else {
                done.set_result(());
            }
        });
    }

    let log = Arc::new(Mutex::new(Vec::new()));
    let done: Arc<TaskSource<()>> = Arc::new(TaskSource::new());

    nested(0, log.clone(), done.clone());
    done.task().wait_until_completed();

    let log = log.lock();
    let caller = thread::current().id();
    assert_eq!(log.len(), TOTAL);
    assert!(log[..MAX_INLINE_DEPTH].iter().all(|id| *id == caller));
    assert!(log[MAX_INLINE_DEPTH..].iter().all(|id| *id != caller));
}

#[test]
fn test_serial_queue_dispatch_is_asynchronous() {
    let queue = SerialQueue::new("async-check");
    let finished = Arc::new(AtomicBool::new(false));

    // Park the worker on a gate so the flag job cannot run early.
    let gate: Arc<TaskSource<()>> = Arc::new(TaskSource::new());
    queue.dispatch(Box::new({
        let gate = gate.task();
        move || gate.wait_until_completed()
    }));

    let done: Arc<TaskSource<()>> = Arc::new(TaskSource::new());
    Executor::Queue(queue).execute({
        let finished = finished.clone();
        let done = done.clone();
        move || {
            finished.store(true, Ordering::SeqCst);
            done.set_result(());
        }
    });

    assert!(!finished.load(Ordering::SeqCst));

    gate.set_result(());
    done.task().wait_until_completed();
    assert!(finished.load(Ordering::SeqCst));
}

#[test]
fn test_serial_queue_runs_jobs_in_fifo_order() {
    let queue = SerialQueue::new("fifo");
    let order = Arc::new(Mutex::new(Vec::new()));
    let done: Arc<TaskSource<()>> = Arc::new(TaskSource::new());

    for i in 0..50 {
        let order = order.clone();
        let done = done.clone();
        queue.dispatch(Box::new(move || {
            order.lock().push(i);
            if i == 49 {
                done.set_result(());
            }
        }));
    }

    done.task().wait_until_completed();
    assert_eq!(*order.lock(), (0..50).collect::<Vec<i32>>());
}

#[test]
fn test_serial_queue_runs_off_the_caller_thread() {
    let queue = SerialQueue::new("threading");
    let done: Arc<TaskSource<ThreadId>> = Arc::new(TaskSource::new());

    {
        let done = done.clone();
        queue.dispatch(Box::new(move || done.set_result(thread::current().id())));
    }

    let task = done.task();
    task.wait_until_completed();
    assert_ne!(task.result(), thread::current().id());
}

#[test]
fn test_operation_queue_honors_concurrency_ceiling() {
    const JOBS: usize = 12;

    let queue = OperationQueue::with_max_concurrency("bounded", 2);
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let remaining = Arc::new(AtomicUsize::new(JOBS));
    let done: Arc<TaskSource<()>> = Arc::new(TaskSource::new());

    for _ in 0..JOBS {
        let active = active.clone();
        let peak = peak.clone();
        let remaining = remaining.clone();
        let done = done.clone();
        queue.enqueue(move || {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            active.fetch_sub(1, Ordering::SeqCst);

            if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                done.set_result(());
            }
        });
    }

    done.task().wait_until_completed();
    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[test]
fn test_main_thread_jobs_share_one_thread() {
    let threads = Arc::new(Mutex::new(Vec::new()));
    let done: Arc<TaskSource<()>> = Arc::new(TaskSource::new());

    for i in 0..2 {
        let threads = threads.clone();
        let done = done.clone();
        Executor::MainThread.execute(move || {
            threads.lock().push(thread::current().id());
            if i == 1 {
                done.set_result(());
            }
        });
    }

    done.task().wait_until_completed();

    let threads = threads.lock();
    assert_eq!(threads.len(), 2);
    assert_eq!(threads[0], threads[1]);
    assert_ne!(threads[0], thread::current().id());
}

#[test]
fn test_main_thread_runs_inline_when_already_there() {
    let done: Arc<TaskSource<bool>> = Arc::new(TaskSource::new());

    {
        let done = done.clone();
        Executor::MainThread.execute(move || {
            let inner_ran = Arc::new(AtomicBool::new(false));
            Executor::MainThread.execute({
                let inner_ran = inner_ran.clone();
                move || inner_ran.store(true, Ordering::SeqCst)
            });

            // Already on the main thread, so the nested job ran inline.
            done.set_result(inner_ran.load(Ordering::SeqCst));
        });
    }

    let task = done.task();
    task.wait_until_completed();
    assert!(task.result());
}

#[test]
fn test_trampoline_is_invoked_per_job() {
    let tracker = DispatchTracker::new();
    let executor = tracker.executor();

    let ran = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let ran = ran.clone();
        executor.execute(move || {
            ran.fetch_add(1, Ordering::SeqCst);
        });
    }

    assert_eq!(ran.load(Ordering::SeqCst), 3);
    assert_eq!(tracker.count(), 3);
    assert_eq!(tracker.distinct_threads(), 1);
}

#[test]
fn test_pool_survives_a_panicking_job() {
    let done: Arc<TaskSource<i32>> = Arc::new(TaskSource::new());

    pool::dispatch(Box::new(|| panic!("contained")));
    pool::dispatch(Box::new({
        let done = done.clone();
        move || done.set_result(9)
    }));

    let task = done.task();
    task.wait_until_completed();
    assert_eq!(task.result(), 9);
}

#[rstest]
#[case::immediate(Executor::Immediate)]
#[case::default(Executor::Default)]
#[case::main_thread(Executor::MainThread)]
#[case::queue(Executor::serial_queue("described"))]
#[case::operation_queue(Executor::OperationQueue(OperationQueue::new("described-ops")))]
#[case::closure(Executor::closure(|job| job()))]
fn test_descriptions_are_non_empty(#[case] executor: Executor) {
    assert!(!executor.to_string().is_empty());
    assert!(!format!("{executor:?}").is_empty());
}

#[test]
fn test_display_names_the_queue() {
    let executor = Executor::serial_queue("uploads");
    assert_eq!(executor.to_string(), "queue:uploads");

    let executor = Executor::OperationQueue(OperationQueue::with_max_concurrency("ops", 3));
    assert_eq!(executor.to_string(), "operation-queue:ops");
}
