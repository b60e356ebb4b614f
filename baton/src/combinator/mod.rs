//! Aggregate operations over collections of tasks.

use crate::error::{AggregateError, TaskError};
use crate::executor::Executor;
use crate::task::{Core, Outcome, Task};
use parking_lot::Mutex;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

mod delay;


/// Shared progress of a `when_all` aggregate. Each input decrements
/// `remaining` from an inline continuation; whoever hits zero concludes.
struct AllProgress {
    remaining: AtomicUsize,
    errors: Mutex<Vec<TaskError>>,
    any_cancelled: AtomicBool,
}

impl AllProgress {
    fn new(count: usize) -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicUsize::new(count),
            errors: Mutex::new(Vec::new()),
            any_cancelled: AtomicBool::new(false),
        })
    }

    /// Record one completed input. Returns true for the final one.
    fn absorb<T: Send + 'static>(&self, task: &Task<T>) -> bool {
        if let Some(error) = task.error() {
            self.errors.lock().push(error);
        } else if task.is_cancelled() {
            self.any_cancelled.store(true, Ordering::Release);
        }

        self.remaining.fetch_sub(1, Ordering::AcqRel) == 1
    }

    /// Faults win over cancellation: when an input fails, its siblings are
    /// often cancelled as a consequence, and the fault is the story worth
    /// surfacing.
    fn conclude<U>(&self, on_success: impl FnOnce() -> U) -> Outcome<U> {
        let errors = mem::take(&mut *self.errors.lock());
        if !errors.is_empty() {
            Outcome::Fault(Arc::new(anyhow::Error::new(AggregateError::new(errors))))
        } else if self.any_cancelled.load(Ordering::Acquire) {
            Outcome::Cancelled
        } else {
            Outcome::Success(on_success())
        }
    }
}

impl<T: Send + 'static> Task<T> {
    /// A task that completes once every input has, successful only when all
    /// inputs were.
    ///
    /// Any faulted input makes the aggregate fault with an
    /// [`AggregateError`] collecting every input error in completion order.
    /// Otherwise, any cancelled input cancels the aggregate. An empty input
    /// succeeds immediately.
    pub fn when_all<I>(tasks: I) -> Task<()>
    where
        I: IntoIterator<Item = Task<T>>,
    {
        let tasks: Vec<Task<T>> = tasks.into_iter().collect();
        if tasks.is_empty() {
            return Task::from_value(());
        }

        let aggregate = Core::pending();
        let progress = AllProgress::new(tasks.len());

        for task in tasks {
            let observed = task.clone();
            let progress = progress.clone();
            let aggregate = aggregate.clone();
            task.core.register(
                Executor::Immediate,
                Box::new(move || {
                    if progress.absorb(&observed) {
                        aggregate.complete(progress.conclude(|| ()));
                    }
                }),
            );
        }

        Task::from_core(aggregate)
    }

    /// A task that completes with the first input to reach a terminal
    /// state, mirroring that input's success, fault, or cancellation.
    /// Later completions are ignored.
    ///
    /// The successful value is the winning task itself, still carrying its
    /// own outcome.
    ///
    /// # Panics
    ///
    /// Panics on an empty input; there is no first completion to wait for.
    pub fn when_any<I>(tasks: I) -> Task<Task<T>>
    where
        I: IntoIterator<Item = Task<T>>,
    {
        let tasks: Vec<Task<T>> = tasks.into_iter().collect();
        assert!(!tasks.is_empty(), "when_any needs at least one input task");

        let winner = Core::pending();

        for task in tasks {
            let observed = task.clone();
            let winner = winner.clone();
            task.core.register(
                Executor::Immediate,
                Box::new(move || {
                    if let Some(error) = observed.error() {
                        winner.try_complete(Outcome::Fault(error));
                    } else if observed.is_cancelled() {
                        winner.try_complete(Outcome::Cancelled);
                    } else {
                        winner.try_complete(Outcome::Success(observed.clone()));
                    }
                }),
            );
        }

        Task::from_core(winner)
    }
}

impl<T: Clone + Send + 'static> Task<T> {
    /// [`when_all`](Task::when_all), but a successful aggregate carries the
    /// input values, in input order regardless of completion order.
    pub fn when_all_result<I>(tasks: I) -> Task<Vec<T>>
    where
        I: IntoIterator<Item = Task<T>>,
    {
        let tasks: Arc<Vec<Task<T>>> = Arc::new(tasks.into_iter().collect());
        if tasks.is_empty() {
            return Task::from_value(Vec::new());
        }

        let aggregate = Core::pending();
        let progress = AllProgress::new(tasks.len());

        for task in tasks.iter() {
            let observed = task.clone();
            let inputs = tasks.clone();
            let progress = progress.clone();
            let aggregate = aggregate.clone();
            task.core.register(
                Executor::Immediate,
                Box::new(move || {
                    if progress.absorb(&observed) {
                        // Only reached when no input faulted or cancelled,
                        // so every `result` call below resolves.
                        let outcome =
                            progress.conclude(|| inputs.iter().map(Task::result).collect());
                        aggregate.complete(outcome);
                    }
                }),
            );
        }

        Task::from_core(aggregate)
    }

    /// [`when_any`](Task::when_any), unwrapped: the aggregate completes
    /// with the first input's value, error, or cancellation directly.
    ///
    /// # Panics
    ///
    /// Panics on an empty input.
    pub fn when_any_result<I>(tasks: I) -> Task<T>
    where
        I: IntoIterator<Item = Task<T>>,
    {
        let tasks: Vec<Task<T>> = tasks.into_iter().collect();
        assert!(!tasks.is_empty(), "when_any_result needs at least one input task");

        let winner = Core::pending();

        for task in tasks {
            let observed = task.clone();
            let winner = winner.clone();
            task.core.register(
                Executor::Immediate,
                Box::new(move || {
                    if let Some(error) = observed.error() {
                        winner.try_complete(Outcome::Fault(error));
                    } else if observed.is_cancelled() {
                        winner.try_complete(Outcome::Cancelled);
                    } else {
                        winner.try_complete(Outcome::Success(observed.result()));
                    }
                }),
            );
        }

        Task::from_core(winner)
    }
}
