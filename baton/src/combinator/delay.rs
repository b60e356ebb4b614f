use crate::executor::timer;
use crate::task::{Core, Outcome, Task};
use std::time::Duration;

impl Task<()> {
    /// A task that succeeds once at least `delay` has elapsed.
    ///
    /// The delay mechanism itself never faults or cancels the task. There
    /// is no upper bound on how late the completion fires; a loaded timer
    /// thread slips, it does not skip.
    pub fn with_delay(delay: Duration) -> Task<()> {
        let core = Core::pending();
        let completion = core.clone();
        timer::schedule(delay, Box::new(move || completion.complete(Outcome::Success(()))));
        Task::from_core(core)
    }
}
