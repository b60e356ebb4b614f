//! The designated main thread: a runloop the library spawns on first use
//! and owns for the rest of the process. `Executor::MainThread` runs inline
//! when the caller is already on it and enqueues otherwise. Hosts that need
//! jobs on a thread of their own route through `Executor::Closure` instead.

use crate::executor::{Job, run_contained};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::{Arc, LazyLock};
use std::thread::{self, ThreadId};

static MAIN_LOOP: LazyLock<MainLoop> = LazyLock::new(MainLoop::spawn);

pub(crate) fn is_main_thread() -> bool {
    thread::current().id() == MAIN_LOOP.thread_id
}

pub(crate) fn dispatch(job: Job) {
    let mut jobs = MAIN_LOOP.shared.jobs.lock();
    jobs.push_back(job);
    MAIN_LOOP.shared.available.notify_one();
}

struct MainLoop {
    thread_id: ThreadId,
    shared: Arc<LoopShared>,
}

struct LoopShared {
    jobs: Mutex<VecDeque<Job>>,
    available: Condvar,
}

impl MainLoop {
    fn spawn() -> MainLoop {
        let shared = Arc::new(LoopShared {
            jobs: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        });

        let handle = {
            let shared = shared.clone();
            thread::Builder::new()
                .name("baton-main".into())
                .spawn(move || run_loop(&shared))
                .expect("failed to spawn main loop thread")
        };

        MainLoop { thread_id: handle.thread().id(), shared }
    }
}

fn run_loop(shared: &LoopShared) {
    loop {
        let job = {
            let mut jobs = shared.jobs.lock();
            loop {
                match jobs.pop_front() {
                    Some(job) => break job,
                    None => shared.available.wait(&mut jobs),
                }
            }
        };

        run_contained(job);
    }
}
