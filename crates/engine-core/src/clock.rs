//! Monotonic time abstraction used for deadlines, timers, and idle-tracker backoff.
//!
//! `now()` plus an injectable implementation so tests can control time deterministically
//! instead of sleeping in real time. `SystemClock` wraps `std::time::Instant`;
//! `MockClock` lets tests advance time explicitly.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic instant, opaque except for arithmetic with [`Duration`].
///
/// Deliberately not `std::time::Instant` directly so [`MockClock`] can produce points
/// that compare correctly against real ones without depending on wall-clock state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonotonicTimePoint(u64);

impl MonotonicTimePoint {
    pub const MAX: MonotonicTimePoint = MonotonicTimePoint(u64::MAX);

    pub fn from_nanos_since_start(nanos: u64) -> Self {
        MonotonicTimePoint(nanos)
    }

    pub fn as_nanos_since_start(self) -> u64 {
        self.0
    }

    pub fn checked_add(self, duration: Duration) -> Option<Self> {
        self.0
            .checked_add(duration.as_nanos().min(u64::MAX as u128) as u64)
            .map(MonotonicTimePoint)
    }

    pub fn saturating_duration_since(self, earlier: MonotonicTimePoint) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

/// A source of monotonic time and sleeps, abstracted so production code can run on a
/// real clock while tests run on a controllable one.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> MonotonicTimePoint;

    fn sleep(&self, duration: Duration) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;
}

/// Wraps [`std::time::Instant`], anchored at construction so nanosecond offsets fit in
/// a `u64` for the lifetime of the process.
pub struct SystemClock {
    epoch: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock { epoch: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> MonotonicTimePoint {
        MonotonicTimePoint::from_nanos_since_start(self.epoch.elapsed().as_nanos() as u64)
    }

    fn sleep(&self, duration: Duration) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(park_sleep(duration))
    }
}

/// A plain thread-parking sleep so `engine-core` does not need to depend on Tokio. The
/// transport crate overrides the timer path with its own runtime-backed timer wheel
/// instead of going through this method on the hot path.
async fn park_sleep(duration: Duration) {
    let waker_slot: Arc<std::sync::Mutex<Option<std::task::Waker>>> = Arc::new(std::sync::Mutex::new(None));
    let fired = Arc::new(AtomicBool::new(false));
    {
        let waker_slot = waker_slot.clone();
        let fired = fired.clone();
        std::thread::spawn(move || {
            std::thread::sleep(duration);
            fired.store(true, Ordering::SeqCst);
            if let Some(waker) = waker_slot.lock().unwrap().take() {
                waker.wake();
            }
        });
    }

    struct ParkSleep {
        waker_slot: Arc<std::sync::Mutex<Option<std::task::Waker>>>,
        fired: Arc<AtomicBool>,
    }
    impl std::future::Future for ParkSleep {
        type Output = ();
        fn poll(
            self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<()> {
            if self.fired.load(Ordering::SeqCst) {
                std::task::Poll::Ready(())
            } else {
                *self.waker_slot.lock().unwrap() = Some(cx.waker().clone());
                std::task::Poll::Pending
            }
        }
    }
    ParkSleep { waker_slot, fired }.await
}

/// A clock whose `now()` is driven entirely by [`MockClock::advance`], for
/// deterministic unit tests of deadline and idle-tracker logic.
#[derive(Clone)]
pub struct MockClock {
    nanos: Arc<AtomicU64>,
}

impl Default for MockClock {
    fn default() -> Self {
        MockClock {
            nanos: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl MockClock {
    pub fn advance(&self, duration: Duration) {
        self.nanos.fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now(&self) -> MonotonicTimePoint {
        MonotonicTimePoint::from_nanos_since_start(self.nanos.load(Ordering::SeqCst))
    }

    fn sleep(&self, _duration: Duration) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(std::future::ready(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_advances_deterministically() {
        let clock = MockClock::default();
        let t0 = clock.now();
        clock.advance(Duration::from_secs(5));
        let t1 = clock.now();
        assert_eq!(t1.saturating_duration_since(t0), Duration::from_secs(5));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::default();
        let t0 = clock.now();
        let t1 = clock.now();
        assert!(t1 >= t0);
    }
}
