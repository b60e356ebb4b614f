use std::any::Any;
use std::sync::Arc;

/// Shared handle to the error that faulted a task.
///
/// A completed task can be observed by any number of handles and
/// continuations, so the underlying error is reference-counted. Use
/// [`anyhow::Error::downcast_ref`] through the `Arc` to recover a concrete
/// error type.
pub type TaskError = Arc<anyhow::Error>;

/// Error produced by [`when_all`](crate::Task::when_all) and
/// [`when_all_result`](crate::Task::when_all_result) when at least one input
/// task faulted.
///
/// Carries every underlying error, in the order the inputs completed (which
/// is generally not the order they were passed in).
#[derive(Debug, thiserror::Error)]
#[error("{} task(s) faulted in aggregate", .errors.len())]
pub struct AggregateError {
    errors: Vec<TaskError>,
}

impl AggregateError {
    pub(crate) fn new(errors: Vec<TaskError>) -> Self {
        debug_assert!(!errors.is_empty(), "an aggregate error needs at least one error");
        Self { errors }
    }

    /// The underlying errors, one per faulted input, in completion order.
    pub fn errors(&self) -> &[TaskError] {
        &self.errors
    }
}

/// Convert a caught panic payload into an error a task can fault with.
///
/// Panic payloads are `&str` or `String` for every `panic!` invocation with
/// a message; anything else is reported without detail.
pub(crate) fn panic_to_error(payload: Box<dyn Any + Send>) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned());

    anyhow::anyhow!("continuation panicked: {message}")
}
