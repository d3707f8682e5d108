//! Lock-free idle-connection state machine.
//!
//! Grounded on gRPC's client-channel idle detector: a connection with no active calls
//! arms an idle timer; if a call starts before the timer fires, the timer is allowed to
//! fire harmlessly because the state machine remembers a call was seen and re-arms
//! instead of closing. The whole thing runs on a single `AtomicU8` plus a call counter
//! so the hot path (`on_call_start`/`on_call_end`) never takes a lock.
//!
//! States:
//! - `Idle`: no calls active, no timer armed.
//! - `CallsActive`: at least one call in flight.
//! - `TimerPending`: no calls active, idle timer armed and still valid.
//! - `TimerPendingCallsActive`: timer armed, but a call is in flight; when the timer
//!   fires it is dropped rather than closing, since the channel is plainly not idle.
//! - `TimerPendingCallsSeenSinceTimerStart`: the counter dropped back to zero after a
//!   call was seen while the timer was armed, so the timer is stale but a fresh idle
//!   span started at `last_idle_time`; firing re-arms from that point instead of
//!   closing immediately.
//! - `Processing`: transient state held while deciding the outcome of a timer fire, so
//!   a concurrent `on_call_start` cannot race the close/re-arm decision.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};

use crate::clock::MonotonicTimePoint;

/// Upper bound on CAS retries before yielding the thread, chosen so a tight contention
/// window spins through a handful of cache-line round trips before giving the
/// scheduler a chance to run the thread holding the conflicting update.
const MAX_CAS_SPINS: u32 = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum IdleState {
    Idle = 0,
    CallsActive = 1,
    TimerPending = 2,
    TimerPendingCallsActive = 3,
    TimerPendingCallsSeenSinceTimerStart = 4,
    Processing = 5,
}

impl IdleState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => IdleState::Idle,
            1 => IdleState::CallsActive,
            2 => IdleState::TimerPending,
            3 => IdleState::TimerPendingCallsActive,
            4 => IdleState::TimerPendingCallsSeenSinceTimerStart,
            5 => IdleState::Processing,
            _ => unreachable!("idle tracker state byte out of range"),
        }
    }
}

/// What the caller should do after a state transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdleAction {
    /// No externally visible effect.
    None,
    /// Arm the idle timer for `idle_timeout` past the carried anchor point.
    ArmTimer(MonotonicTimePoint),
    /// The connection should be closed for idleness. Caller must follow up with
    /// [`IdleTracker::finish_close`].
    CloseForIdle,
    /// A timer fired but calls were seen since it was armed; re-arm for `idle_timeout`
    /// past the carried anchor point. Caller must follow up with
    /// [`IdleTracker::finish_rearm`].
    RearmTimer(MonotonicTimePoint),
}

/// The idle-connection tracker itself.
pub struct IdleTracker {
    state: AtomicU8,
    active_calls: AtomicUsize,
    /// Nanosecond offset of the instant the call counter last reached zero. Published
    /// by the release-ordered state transition in `on_call_end` and observed through the
    /// acquire-ordered CAS into `Processing` in `on_timer_fire`, so a plain `AtomicU64`
    /// gives the same happens-before edge the state transition already provides without
    /// needing an `UnsafeCell`.
    last_idle_time: AtomicU64,
}

impl Default for IdleTracker {
    fn default() -> Self {
        IdleTracker {
            state: AtomicU8::new(IdleState::Idle as u8),
            active_calls: AtomicUsize::new(0),
            last_idle_time: AtomicU64::new(0),
        }
    }
}

impl IdleTracker {
    pub fn new() -> Self {
        IdleTracker::default()
    }

    pub fn state(&self) -> IdleState {
        IdleState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn active_calls(&self) -> usize {
        self.active_calls.load(Ordering::Acquire)
    }

    /// The instant the call counter last dropped to zero, as recorded by `on_call_end`.
    pub fn last_idle_time(&self) -> MonotonicTimePoint {
        MonotonicTimePoint::from_nanos_since_start(self.last_idle_time.load(Ordering::Acquire))
    }

    /// Runs `transition` against the current state in a CAS loop. `transition` returns
    /// `Some((next, action))` to attempt a move to `next`, or `None` to spin without
    /// attempting a CAS at all (used while the state is transiently `Processing` and no
    /// caller can yet know what the resolved next state should be).
    fn cas_loop(
        &self,
        mut transition: impl FnMut(IdleState) -> Option<(IdleState, IdleAction)>,
    ) -> IdleAction {
        let mut spins = 0u32;
        loop {
            let current = IdleState::from_u8(self.state.load(Ordering::Acquire));
            let Some((next, action)) = transition(current) else {
                spins += 1;
                if spins >= MAX_CAS_SPINS {
                    std::thread::yield_now();
                    spins = 0;
                }
                continue;
            };
            if next == current {
                return action;
            }
            match self.state.compare_exchange_weak(
                current as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return action,
                Err(_) => {
                    spins += 1;
                    if spins >= MAX_CAS_SPINS {
                        std::thread::yield_now();
                        spins = 0;
                    }
                }
            }
        }
    }

    /// A call started. Returns the action the caller (the Endpoint) must take.
    pub fn on_call_start(&self) -> IdleAction {
        self.active_calls.fetch_add(1, Ordering::AcqRel);
        self.cas_loop(|state| match state {
            IdleState::Idle => Some((IdleState::CallsActive, IdleAction::None)),
            IdleState::CallsActive => Some((IdleState::CallsActive, IdleAction::None)),
            IdleState::TimerPending => Some((IdleState::TimerPendingCallsActive, IdleAction::None)),
            IdleState::TimerPendingCallsActive => {
                Some((IdleState::TimerPendingCallsActive, IdleAction::None))
            }
            IdleState::TimerPendingCallsSeenSinceTimerStart => {
                Some((IdleState::TimerPendingCallsActive, IdleAction::None))
            }
            // A timer-fire decision is in flight; wait for it to resolve before
            // deciding how this call folds into the next state.
            IdleState::Processing => None,
        })
    }

    /// A call ended. When the last active call ends, records `now` as the start of the
    /// new idle span and arms the idle timer.
    pub fn on_call_end(&self, now: MonotonicTimePoint) -> IdleAction {
        let remaining = self.active_calls.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining > 0 {
            return IdleAction::None;
        }
        self.last_idle_time.store(now.as_nanos_since_start(), Ordering::Release);
        self.cas_loop(|state| match state {
            IdleState::CallsActive => Some((IdleState::TimerPending, IdleAction::ArmTimer(now))),
            IdleState::TimerPendingCallsActive => Some((
                IdleState::TimerPendingCallsSeenSinceTimerStart,
                IdleAction::None,
            )),
            IdleState::Processing => None,
            other => Some((other, IdleAction::None)),
        })
    }

    /// The idle timer fired. Closes the connection if no call was seen since the timer
    /// was armed, drops the timer harmlessly if a call is still active, or re-arms from
    /// the last recorded idle point if a call was seen but has since ended.
    pub fn on_timer_fire(&self) -> IdleAction {
        self.cas_loop(|state| match state {
            IdleState::TimerPending => Some((IdleState::Processing, IdleAction::CloseForIdle)),
            IdleState::TimerPendingCallsActive => Some((IdleState::CallsActive, IdleAction::None)),
            IdleState::TimerPendingCallsSeenSinceTimerStart => Some((
                IdleState::Processing,
                IdleAction::RearmTimer(self.last_idle_time()),
            )),
            other => Some((other, IdleAction::None)),
        })
    }

    /// Completes a `CloseForIdle` decision, returning the tracker to `Idle` so a new
    /// connection on the same endpoint starts clean.
    pub fn finish_close(&self) {
        self.state.store(IdleState::Idle as u8, Ordering::Release);
    }

    /// Completes a `RearmTimer` decision, returning the tracker to `TimerPending` now
    /// that the new timer has been armed.
    pub fn finish_rearm(&self) {
        self.state.store(IdleState::TimerPending as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn tp(nanos: u64) -> MonotonicTimePoint {
        MonotonicTimePoint::from_nanos_since_start(nanos)
    }

    #[test]
    fn idle_to_calls_active_on_first_call() {
        let tracker = IdleTracker::new();
        assert_eq!(tracker.on_call_start(), IdleAction::None);
        assert_eq!(tracker.state(), IdleState::CallsActive);
    }

    #[test]
    fn last_call_ending_arms_timer() {
        let tracker = IdleTracker::new();
        tracker.on_call_start();
        assert_eq!(tracker.on_call_end(tp(10)), IdleAction::ArmTimer(tp(10)));
        assert_eq!(tracker.state(), IdleState::TimerPending);
        assert_eq!(tracker.last_idle_time(), tp(10));
    }

    #[test]
    fn timer_fire_with_no_calls_seen_closes() {
        let tracker = IdleTracker::new();
        tracker.on_call_start();
        tracker.on_call_end(tp(0));
        assert_eq!(tracker.on_timer_fire(), IdleAction::CloseForIdle);
        assert_eq!(tracker.state(), IdleState::Processing);
        tracker.finish_close();
        assert_eq!(tracker.state(), IdleState::Idle);
    }

    #[test]
    fn call_during_pending_timer_is_dropped_harmlessly_on_fire() {
        let tracker = IdleTracker::new();
        tracker.on_call_start();
        tracker.on_call_end(tp(0));
        assert_eq!(tracker.state(), IdleState::TimerPending);

        tracker.on_call_start();
        assert_eq!(tracker.state(), IdleState::TimerPendingCallsActive);

        assert_eq!(tracker.on_timer_fire(), IdleAction::None);
        assert_eq!(tracker.state(), IdleState::CallsActive);
    }

    #[test]
    fn call_seen_then_ended_before_stale_timer_fires_rearms_from_last_idle_time() {
        let tracker = IdleTracker::new();
        tracker.on_call_start();
        tracker.on_call_end(tp(0));
        assert_eq!(tracker.state(), IdleState::TimerPending);

        // A call starts and ends before the stale timer fires.
        tracker.on_call_start();
        assert_eq!(tracker.state(), IdleState::TimerPendingCallsActive);
        assert_eq!(
            tracker.on_call_end(tp(10)),
            IdleAction::None
        );
        assert_eq!(tracker.state(), IdleState::TimerPendingCallsSeenSinceTimerStart);
        assert_eq!(tracker.last_idle_time(), tp(10));

        // The stale timer fires: re-arm from the new idle point instead of closing.
        assert_eq!(tracker.on_timer_fire(), IdleAction::RearmTimer(tp(10)));
        assert_eq!(tracker.state(), IdleState::Processing);
        tracker.finish_rearm();
        assert_eq!(tracker.state(), IdleState::TimerPending);
    }

    #[test]
    fn concurrent_call_start_and_end_never_corrupts_active_count() {
        let tracker = Arc::new(IdleTracker::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let tracker = tracker.clone();
            handles.push(thread::spawn(move || {
                for i in 0..1000 {
                    tracker.on_call_start();
                    tracker.on_call_end(tp(i));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(tracker.active_calls(), 0);
    }
}
