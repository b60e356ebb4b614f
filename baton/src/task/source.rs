use crate::task::core::Core;
use crate::task::{Outcome, Task};
use std::fmt;
use std::sync::Arc;

/// The write side of a task: completes the paired [`Task`] exactly once.
///
/// A producer keeps the source, hands out as many [`Task`] handles as it
/// likes via [`task`](Self::task), and eventually calls one of the setters.
/// The source is deliberately not `Clone`; a task has one producer.
///
/// The plain setters treat a second completion attempt as a programming
/// error and panic. Use the `try_` variants when losing a completion race
/// is expected, for example when several sources of truth race to finish
/// the same task.
pub struct TaskSource<T> {
    core: Arc<Core<T>>,
}

impl<T: Send + 'static> TaskSource<T> {
    pub fn new() -> Self {
        Self { core: Core::pending() }
    }

    /// A read handle on the task this source completes.
    pub fn task(&self) -> Task<T> {
        Task::from_core(self.core.clone())
    }

    /// Complete with a value.
    ///
    /// # Panics
    ///
    /// Panics if the task already reached a terminal state.
    pub fn set_result(&self, value: T) {
        self.core.complete(Outcome::Success(value));
    }

    /// Complete with an error.
    ///
    /// # Panics
    ///
    /// Panics if the task already reached a terminal state.
    pub fn set_error(&self, error: impl Into<anyhow::Error>) {
        self.core.complete(Outcome::Fault(Arc::new(error.into())));
    }

    /// Complete as cancelled.
    ///
    /// # Panics
    ///
    /// Panics if the task already reached a terminal state.
    pub fn cancel(&self) {
        self.core.complete(Outcome::Cancelled);
    }

    /// Complete with a value, returning whether this call won the
    /// completion. A completed task is left untouched.
    pub fn try_set_result(&self, value: T) -> bool {
        self.core.try_complete(Outcome::Success(value))
    }

    /// Complete with an error, returning whether this call won the
    /// completion.
    pub fn try_set_error(&self, error: impl Into<anyhow::Error>) -> bool {
        self.core.try_complete(Outcome::Fault(Arc::new(error.into())))
    }

    /// Complete as cancelled, returning whether this call won the
    /// completion.
    pub fn try_cancel(&self) -> bool {
        self.core.try_complete(Outcome::Cancelled)
    }
}

impl<T: Send + 'static> Default for TaskSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TaskSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSource")
            .field("state", &self.core.with_state(|state| state.kind()))
            .finish()
    }
}
