//! The background pool behind `Executor::Default`'s spill path and
//! `OperationQueue`. Spawned lazily on first dispatch, one worker per
//! available core, and lives for the rest of the process.

use crate::executor::{Job, run_contained};
use crossbeam_deque::{Injector, Steal};
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, LazyLock};
use std::thread;
use tracing::debug;

static POOL: LazyLock<Pool> = LazyLock::new(Pool::spawn);

pub(crate) fn dispatch(job: Job) {
    POOL.dispatch(job);
}

struct Pool {
    shared: Arc<Shared>,
}

struct Shared {
    injector: Injector<Job>,
    // The mutex carries no data; it only sequences the empty-check in the
    // worker against the push-then-notify in `dispatch`, so a wakeup cannot
    // fall between the two.
    idle: Mutex<()>,
    wakeup: Condvar,
}

impl Pool {
    fn spawn() -> Pool {
        let workers = thread::available_parallelism().map_or(1, usize::from);
        let shared = Arc::new(Shared {
            injector: Injector::new(),
            idle: Mutex::new(()),
            wakeup: Condvar::new(),
        });

        debug!(workers, "spawning background pool");

        for i in 0..workers {
            let shared = shared.clone();
            thread::Builder::new()
                .name(format!("baton-worker-{i}"))
                .spawn(move || worker_loop(&shared))
                .expect("failed to spawn background pool worker");
        }

        Pool { shared }
    }

    fn dispatch(&self, job: Job) {
        self.shared.injector.push(job);
        let _guard = self.shared.idle.lock();
        self.shared.wakeup.notify_one();
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        loop {
            match shared.injector.steal() {
                Steal::Success(job) => run_contained(job),
                Steal::Empty => break,
                Steal::Retry => {}
            }
        }

        let mut guard = shared.idle.lock();
        if shared.injector.is_empty() {
            shared.wakeup.wait(&mut guard);
        }
    }
}
