use crate::executor::{Executor, Job};
use crate::task::{Outcome, Registered, State};
use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;
use std::mem;
use std::sync::Arc;

/// The shared cell behind every [`Task`](crate::Task) and
/// [`TaskSource`](crate::TaskSource) pair.
///
/// The state moves from pending to exactly one terminal outcome. Both the
/// continuation list and the outcome live behind the same mutex, so
/// "observe the state, then either append or run" is atomic with respect to
/// the terminal transition and no continuation can be lost or run twice.
pub(crate) struct Core<T> {
    state: Mutex<State<T>>,
    completed: Condvar,
}

impl<T> Core<T> {
    pub(crate) fn pending() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::Pending(SmallVec::new())),
            completed: Condvar::new(),
        })
    }

    pub(crate) fn done(outcome: Outcome<T>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::Done(outcome)),
            completed: Condvar::new(),
        })
    }

    /// Install the terminal state if still pending and hand every recorded
    /// continuation to its executor. Returns false without side effects when
    /// the core already completed.
    ///
    /// Continuations run strictly outside the lock. A continuation is free
    /// to complete another core whose continuations observe this one, or to
    /// register new continuations here; holding the lock across user code
    /// would deadlock both patterns.
    pub(crate) fn try_complete(&self, outcome: Outcome<T>) -> bool {
        let drained = {
            let mut state = self.state.lock();
            match &mut *state {
                State::Done(_) => return false,
                State::Pending(registered) => {
                    let drained = mem::take(registered);
                    *state = State::Done(outcome);
                    self.completed.notify_all();
                    drained
                }
            }
        };

        // Registration order. What happens after the hand-off is up to each
        // executor.
        for Registered { executor, job } in drained {
            executor.execute_boxed(job);
        }

        true
    }

    /// Like [`try_complete`](Self::try_complete), but completing twice is a
    /// caller bug.
    pub(crate) fn complete(&self, outcome: Outcome<T>) {
        assert!(
            self.try_complete(outcome),
            "task already completed; a task reaches exactly one terminal state"
        );
    }

    /// Record a continuation, or run it immediately when the terminal
    /// transition already happened.
    pub(crate) fn register(&self, executor: Executor, job: Job) {
        {
            let mut state = self.state.lock();
            if let State::Pending(registered) = &mut *state {
                registered.push(Registered { executor, job });
                return;
            }
        }

        executor.execute_boxed(job);
    }

    /// Block the calling thread until the terminal transition.
    pub(crate) fn wait(&self) {
        let mut state = self.state.lock();
        while matches!(&*state, State::Pending(_)) {
            self.completed.wait(&mut state);
        }
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&State<T>) -> R) -> R {
        f(&self.state.lock())
    }
}
