//! Task handles and the scheduling contract for the Task & Timer service.
//!
//! A `{slot, generation}` pair so a cancel issued against a stale handle can never land
//! on a task that has since reused the same slot.

use std::fmt;

use crate::contract::Cancellation;
use crate::error::Result;

/// Relative importance of a scheduled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskPriority {
    Idle,
    Low,
    Normal,
    High,
    Critical,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Normal
    }
}

/// How a running task should respond to cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskCancellationStrategy {
    /// The task observes a [`Cancellation`] flag and unwinds on its own schedule.
    Cooperative,
    /// The scheduler may drop the task's future outright once cancelled.
    Forceful,
}

/// An ABA-safe reference to a scheduled task.
///
/// `generation` increments every time `slot` is reused, so a [`TaskHandle`] captured
/// before a slot was recycled can never be mistaken for the task now occupying it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    slot: u32,
    generation: u32,
}

impl TaskHandle {
    pub fn new(slot: u32, generation: u32) -> Self {
        TaskHandle { slot, generation }
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}.{}", self.slot, self.generation)
    }
}

/// Outcome of attempting to cancel a task by handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The task was pending or running and has now been cancelled.
    Cancelled,
    /// The handle's generation no longer matches the slot's occupant; nothing to do.
    Stale,
    /// The task already ran to completion.
    AlreadyCompleted,
}

/// A closure scheduled to run once, either immediately or at a future point in time.
pub type ScheduledFn = Box<dyn FnOnce() + Send + 'static>;

/// Contract for the Task & Timer service: schedule work now or at a
/// deadline, and cancel it by handle before it runs.
pub trait TaskScheduler: Send + Sync {
    /// Schedules `work` to run as soon as a worker is available.
    fn run_now(&self, priority: TaskPriority, work: ScheduledFn) -> Result<TaskHandle>;

    /// Schedules `work` to run at `at`, a monotonic time point produced by the same
    /// [`crate::clock::Clock`] the caller is using for deadlines.
    fn run_at(
        &self,
        at: crate::clock::MonotonicTimePoint,
        priority: TaskPriority,
        work: ScheduledFn,
    ) -> Result<TaskHandle>;

    /// Cancels a previously scheduled task. Cooperative tasks observe cancellation
    /// through the [`Cancellation`] token passed at scheduling time, if any; this
    /// method never blocks waiting for a running task to notice.
    fn cancel(&self, handle: TaskHandle) -> CancelOutcome;
}

/// A scheduling request bundled with its cancellation token, for schedulers that want
/// to hand the token to the closure itself rather than tracking it out of band.
pub struct TaskRequest {
    pub priority: TaskPriority,
    pub strategy: TaskCancellationStrategy,
    pub cancellation: Cancellation,
}

impl Default for TaskRequest {
    fn default() -> Self {
        TaskRequest {
            priority: TaskPriority::default(),
            strategy: TaskCancellationStrategy::Cooperative,
            cancellation: Cancellation::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_with_same_slot_but_different_generation_are_distinct() {
        let a = TaskHandle::new(3, 1);
        let b = TaskHandle::new(3, 2);
        assert_ne!(a, b);
        assert_eq!(a.slot(), b.slot());
    }

    #[test]
    fn priority_ordering_matches_ladder() {
        assert!(TaskPriority::Critical > TaskPriority::High);
        assert!(TaskPriority::High > TaskPriority::Normal);
        assert!(TaskPriority::Normal > TaskPriority::Low);
        assert!(TaskPriority::Low > TaskPriority::Idle);
    }
}
