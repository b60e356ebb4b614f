use crate::error::TaskError;
use crate::executor::{Executor, Job};
use smallvec::SmallVec;

/// Terminal state of a task.
///
/// Once a task leaves its pending state it holds exactly one of these for
/// the rest of its life. Continuations observe the outcome through the task
/// handle they were attached to; awaiting a task yields it directly.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The producer supplied a value.
    Success(T),

    /// The producer supplied an error, or a continuation failed.
    Fault(TaskError),

    /// The producer gave up without a value or an error.
    Cancelled,
}

impl<T> Outcome<T> {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "succeeded",
            Outcome::Fault(_) => "faulted",
            Outcome::Cancelled => "cancelled",
        }
    }
}

/// A continuation recorded while the owning task was still pending, paired
/// with the executor it must be handed to on the terminal transition.
pub(crate) struct Registered {
    pub(crate) executor: Executor,
    pub(crate) job: Job,
}

// Most tasks carry zero, one, or two continuations, so the list lives
// inline until it spills.
pub(crate) enum State<T> {
    Pending(SmallVec<[Registered; 2]>),
    Done(Outcome<T>),
}

impl<T> State<T> {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            State::Pending(_) => "pending",
            State::Done(outcome) => outcome.kind(),
        }
    }
}
