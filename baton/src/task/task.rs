use crate::error::{TaskError, panic_to_error};
use crate::executor::Executor;
use crate::task::core::Core;
use crate::task::{Outcome, State};
use anyhow::Result;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// A read handle on the eventual outcome of a computation.
///
/// A `Task<T>` ends in exactly one of three terminal states: success with a
/// `T`, a fault carrying an error, or cancellation. Handles are cheap to
/// clone and every clone observes the same shared state.
///
/// Consumers react to completion by attaching continuations:
///
/// ```
/// use baton::{Executor, Task};
///
/// let doubled = Task::from_value(21).continue_on_success_with(Executor::Immediate, |n| Ok(n * 2));
/// doubled.wait_until_completed();
/// assert_eq!(doubled.result(), 42);
/// ```
///
/// Each continuation is handed to the executor chosen at attachment time,
/// exactly once, whether it was attached before or after the task
/// completed. A task with a `Clone` value can also be `.await`ed; see the
/// [`Future`] impl below.
pub struct Task<T> {
    pub(crate) core: Arc<Core<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self { core: self.core.clone() }
    }
}

impl<T: Send + 'static> Task<T> {
    pub(crate) fn from_core(core: Arc<Core<T>>) -> Self {
        Self { core }
    }

    /// A task that already succeeded with `value`.
    pub fn from_value(value: T) -> Self {
        Self { core: Core::done(Outcome::Success(value)) }
    }

    /// A task that already faulted with `error`.
    pub fn from_error(error: impl Into<anyhow::Error>) -> Self {
        Self { core: Core::done(Outcome::Fault(Arc::new(error.into()))) }
    }

    /// A task that was already cancelled.
    pub fn cancelled() -> Self {
        Self { core: Core::done(Outcome::Cancelled) }
    }

    /// Run `f` on `executor` and expose its return value as a task.
    ///
    /// An `Err` return faults the task; a panic inside `f` is caught and
    /// faults the task as well.
    pub fn execute<F>(executor: Executor, f: F) -> Task<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let core = Core::pending();
        let completion = core.clone();
        executor.execute(move || {
            completion.complete(outcome_of(catch_unwind(AssertUnwindSafe(f))));
        });
        Self { core }
    }

    /// Whether the task reached a terminal state.
    pub fn is_completed(&self) -> bool {
        self.core.with_state(|state| matches!(state, State::Done(_)))
    }

    /// Whether the task completed with an error.
    pub fn is_faulted(&self) -> bool {
        self.core
            .with_state(|state| matches!(state, State::Done(Outcome::Fault(_))))
    }

    /// Whether the task was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.core
            .with_state(|state| matches!(state, State::Done(Outcome::Cancelled)))
    }

    /// The error of a faulted task, `None` in every other state.
    pub fn error(&self) -> Option<TaskError> {
        self.core.with_state(|state| match state {
            State::Done(Outcome::Fault(error)) => Some(error.clone()),
            _ => None,
        })
    }

    /// Block the calling thread until the task completes.
    ///
    /// Does not consume or return the outcome; inspect the task afterwards.
    /// Blocking a thread that the completion itself needs (for example the
    /// main thread, when the producer completes from a main-thread
    /// continuation) deadlocks, and no attempt is made to detect that.
    pub fn wait_until_completed(&self) {
        self.core.wait();
    }

    /// Attach a continuation that runs on `executor` once this task
    /// completes, producing a new task from its return value.
    ///
    /// The continuation always runs, whatever the terminal state; it
    /// receives the completed task and decides for itself. Use
    /// [`continue_on_success_with`](Self::continue_on_success_with) to skip
    /// faulted and cancelled antecedents instead.
    ///
    /// The produced task faults if the continuation returns `Err` or
    /// panics.
    pub fn continue_with<U, F>(&self, executor: Executor, f: F) -> Task<U>
    where
        U: Send + 'static,
        F: FnOnce(&Task<T>) -> Result<U> + Send + 'static,
    {
        let produced = Core::pending();
        let completion = produced.clone();
        let antecedent = self.clone();
        self.core.register(
            executor,
            Box::new(move || {
                completion.complete(outcome_of(catch_unwind(AssertUnwindSafe(|| f(&antecedent)))));
            }),
        );
        Task::from_core(produced)
    }

    /// Like [`continue_with`](Self::continue_with), for continuations that
    /// themselves return a task.
    ///
    /// The task returned here is always a fresh handle; it mirrors the
    /// terminal state of whichever task the continuation returns, once that
    /// inner task completes.
    pub fn continue_with_task<U, F>(&self, executor: Executor, f: F) -> Task<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(&Task<T>) -> Result<Task<U>> + Send + 'static,
    {
        let produced = Core::pending();
        let completion = produced.clone();
        let antecedent = self.clone();
        self.core.register(
            executor,
            Box::new(move || match catch_unwind(AssertUnwindSafe(|| f(&antecedent))) {
                Ok(Ok(inner)) => bridge_into(&inner, completion),
                Ok(Err(error)) => completion.complete(Outcome::Fault(Arc::new(error))),
                Err(payload) => {
                    completion.complete(Outcome::Fault(Arc::new(panic_to_error(payload))));
                }
            }),
        );
        Task::from_core(produced)
    }
}

impl<T: Clone + Send + 'static> Task<T> {
    /// The success value.
    ///
    /// # Panics
    ///
    /// Panics unless the task completed successfully. Check
    /// [`is_completed`](Self::is_completed) and friends, or match on
    /// [`outcome`](Self::outcome), before reaching for the value.
    pub fn result(&self) -> T {
        self.core.with_state(|state| match state {
            State::Done(Outcome::Success(value)) => value.clone(),
            other => panic!("no result: task {}", other.kind()),
        })
    }

    /// The terminal state, or `None` while still pending.
    pub fn outcome(&self) -> Option<Outcome<T>> {
        self.core.with_state(|state| match state {
            State::Done(outcome) => Some(outcome.clone()),
            State::Pending(_) => None,
        })
    }

    /// Run `f` on `executor`; the task it returns decides the outcome.
    pub fn execute_with_task<F>(executor: Executor, f: F) -> Task<T>
    where
        F: FnOnce() -> Result<Task<T>> + Send + 'static,
    {
        let core = Core::pending();
        let completion = core.clone();
        executor.execute(move || match catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(inner)) => bridge_into(&inner, completion),
            Ok(Err(error)) => completion.complete(Outcome::Fault(Arc::new(error))),
            Err(payload) => completion.complete(Outcome::Fault(Arc::new(panic_to_error(payload)))),
        });
        Self { core }
    }

    /// Attach a continuation that only runs when this task succeeds.
    ///
    /// A faulted antecedent forwards its error into the produced task and a
    /// cancelled antecedent cancels it, in both cases without invoking `f`.
    pub fn continue_on_success_with<U, F>(&self, executor: Executor, f: F) -> Task<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        let produced = Core::pending();
        let completion = produced.clone();
        let antecedent = self.clone();
        self.core.register(
            executor,
            Box::new(move || match antecedent.terminal() {
                Outcome::Success(value) => {
                    completion.complete(outcome_of(catch_unwind(AssertUnwindSafe(|| f(value)))));
                }
                Outcome::Fault(error) => completion.complete(Outcome::Fault(error)),
                Outcome::Cancelled => completion.complete(Outcome::Cancelled),
            }),
        );
        Task::from_core(produced)
    }

    /// [`continue_on_success_with`](Self::continue_on_success_with) for
    /// continuations that return a task.
    pub fn continue_on_success_with_task<U, F>(&self, executor: Executor, f: F) -> Task<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<Task<U>> + Send + 'static,
    {
        let produced = Core::pending();
        let completion = produced.clone();
        let antecedent = self.clone();
        self.core.register(
            executor,
            Box::new(move || match antecedent.terminal() {
                Outcome::Success(value) => {
                    match catch_unwind(AssertUnwindSafe(|| f(value))) {
                        Ok(Ok(inner)) => bridge_into(&inner, completion),
                        Ok(Err(error)) => completion.complete(Outcome::Fault(Arc::new(error))),
                        Err(payload) => {
                            completion.complete(Outcome::Fault(Arc::new(panic_to_error(payload))));
                        }
                    }
                }
                Outcome::Fault(error) => completion.complete(Outcome::Fault(error)),
                Outcome::Cancelled => completion.complete(Outcome::Cancelled),
            }),
        );
        Task::from_core(produced)
    }

    /// The terminal state of a task known to have completed. Continuations
    /// only fire after the terminal transition, so inside one this always
    /// resolves.
    fn terminal(&self) -> Outcome<T> {
        self.outcome()
            .expect("continuation fired before the terminal transition")
    }
}

/// Forward the terminal state of `inner` into `target` once `inner`
/// completes. The hop runs inline on whichever thread completes `inner`.
fn bridge_into<U: Clone + Send + 'static>(inner: &Task<U>, target: Arc<Core<U>>) {
    let observed = inner.clone();
    inner.core.register(
        Executor::Immediate,
        Box::new(move || target.complete(observed.terminal())),
    );
}

fn outcome_of<U>(run: std::thread::Result<Result<U>>) -> Outcome<U> {
    match run {
        Ok(Ok(value)) => Outcome::Success(value),
        Ok(Err(error)) => Outcome::Fault(Arc::new(error)),
        Err(payload) => Outcome::Fault(Arc::new(panic_to_error(payload))),
    }
}

/// Awaiting a task yields its [`Outcome`].
///
/// Each poll registers a fresh waker as an inline continuation, so a task
/// may wake spuriously when polled from more than one place; the
/// continuation-runs-once guarantee is unaffected.
impl<T: Clone + Send + 'static> Future for Task<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(outcome) = self.outcome() {
            return Poll::Ready(outcome);
        }

        // If the task completes between the check above and this
        // registration, the core runs the job immediately and the wake
        // triggers a re-poll.
        let waker = cx.waker().clone();
        self.core
            .register(Executor::Immediate, Box::new(move || waker.wake()));

        Poll::Pending
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("state", &self.core.with_state(|state| state.kind()))
            .finish()
    }
}
