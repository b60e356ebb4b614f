//! One timer thread for the whole process, firing jobs at or after their
//! deadline. Entries sit in a min-heap keyed on deadline; the thread sleeps
//! until the nearest one and wakes early when something nearer arrives.

use crate::executor::{Job, run_contained};
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{self, AtomicU64};
use std::sync::{Arc, LazyLock};
use std::thread;
use std::time::{Duration, Instant};
use tracing::trace;

static TIMER: LazyLock<Timer> = LazyLock::new(Timer::spawn);

pub(crate) fn schedule(delay: Duration, job: Job) {
    trace!(?delay, "scheduling timer entry");
    TIMER.schedule(delay, job);
}

struct Timer {
    shared: Arc<TimerShared>,
}

struct TimerShared {
    entries: Mutex<BinaryHeap<TimerEntry>>,
    rescheduled: Condvar,
    seq: AtomicU64,
}

struct TimerEntry {
    deadline: Instant,
    // Tie-breaker so entries with equal deadlines fire in schedule order.
    seq: u64,
    job: Job,
}

impl Timer {
    fn spawn() -> Timer {
        let shared = Arc::new(TimerShared {
            entries: Mutex::new(BinaryHeap::new()),
            rescheduled: Condvar::new(),
            seq: AtomicU64::new(0),
        });

        {
            let shared = shared.clone();
            thread::Builder::new()
                .name("baton-timer".into())
                .spawn(move || timer_loop(&shared))
                .expect("failed to spawn timer thread");
        }

        Timer { shared }
    }

    fn schedule(&self, delay: Duration, job: Job) {
        let entry = TimerEntry {
            deadline: Instant::now() + delay,
            seq: self.shared.seq.fetch_add(1, atomic::Ordering::Relaxed),
            job,
        };

        let mut entries = self.shared.entries.lock();
        entries.push(entry);
        self.shared.rescheduled.notify_one();
    }
}

fn timer_loop(shared: &TimerShared) {
    loop {
        let due = {
            let mut entries = shared.entries.lock();
            loop {
                match entries.peek().map(|entry| entry.deadline) {
                    Some(deadline) if deadline <= Instant::now() => {
                        break entries.pop().map(|entry| entry.job);
                    }
                    Some(deadline) => {
                        shared.rescheduled.wait_until(&mut entries, deadline);
                    }
                    None => shared.rescheduled.wait(&mut entries),
                }
            }
        };

        if let Some(job) = due {
            run_contained(job);
        }
    }
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

// Reversed so the `BinaryHeap` max-heap pops the nearest deadline first.
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
