//! Cancellation and deadline primitives shared by every long-running operation.
//!
//! A flag shared via `Arc<AtomicBool>` with first-caller-wins `cancel()` semantics and
//! child tokens that inherit their parent's cancellation, plus a deadline built from a
//! monotonic time point rather than a wall-clock one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::MonotonicTimePoint;

/// A cooperative cancellation flag, shareable across threads and tasks.
///
/// `cancel()` returns `true` only for the call that actually transitions the flag, so
/// callers can tell whether they were the one to trigger teardown.
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    inner: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Cancellation {
            inner: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }

    /// Marks this token cancelled. Returns `true` if this call was the first to do so.
    pub fn cancel(&self) -> bool {
        self.inner
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Creates a child token. The child observes the parent's cancellation (future
    /// reads are independent, so cancelling the child never cancels the parent).
    pub fn child(&self) -> Cancellation {
        if self.is_cancelled() {
            let child = Cancellation::new();
            child.cancel();
            child
        } else {
            Cancellation::new()
        }
    }
}

/// A point in time after which an operation should be abandoned.
///
/// Built from [`MonotonicTimePoint`] rather than wall-clock time so that clock
/// adjustments never cause a deadline to jump backwards or forwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadline(Option<MonotonicTimePoint>);

impl Deadline {
    pub const fn never() -> Self {
        Deadline(None)
    }

    pub fn at(point: MonotonicTimePoint) -> Self {
        Deadline(Some(point))
    }

    pub fn with_timeout(now: MonotonicTimePoint, timeout: Duration) -> Self {
        Deadline(Some(now.checked_add(timeout).unwrap_or(MonotonicTimePoint::MAX)))
    }

    pub fn is_expired(&self, now: MonotonicTimePoint) -> bool {
        matches!(self.0, Some(point) if now >= point)
    }

    pub fn remaining(&self, now: MonotonicTimePoint) -> Option<Duration> {
        self.0.map(|point| point.saturating_duration_since(now))
    }

    pub fn point(&self) -> Option<MonotonicTimePoint> {
        self.0
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Deadline::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::clock::Clock;

    #[test]
    fn cancel_is_first_caller_wins() {
        let token = Cancellation::new();
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn child_of_cancelled_parent_starts_cancelled() {
        let parent = Cancellation::new();
        parent.cancel();
        let child = parent.child();
        assert!(child.is_cancelled());
    }

    #[test]
    fn child_of_live_parent_starts_live() {
        let parent = Cancellation::new();
        let child = parent.child();
        assert!(!child.is_cancelled());
        child.cancel();
        assert!(!parent.is_cancelled(), "child cancellation must not propagate to parent");
    }

    #[test]
    fn deadline_never_does_not_expire() {
        let clock = SystemClock::default();
        assert!(!Deadline::never().is_expired(clock.now()));
    }

    #[test]
    fn deadline_with_timeout_expires_after_duration() {
        let clock = SystemClock::default();
        let now = clock.now();
        let deadline = Deadline::with_timeout(now, Duration::from_millis(0));
        assert!(deadline.is_expired(now));
    }
}
