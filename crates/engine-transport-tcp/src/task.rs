//! Tokio-backed Task & Timer service, grounded on the handle contract in
//! `engine_core::task` and backed by Tokio's own worker pool and timer wheel rather
//! than a hand-rolled scheduler, per the design note that a single concrete backend
//! fills both roles.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use engine_core::clock::{Clock, MonotonicTimePoint, SystemClock};
use engine_core::error::Result;
use engine_core::task::{CancelOutcome, ScheduledFn, TaskHandle, TaskPriority, TaskScheduler};

struct Slot {
    generation: u32,
    cancel_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

/// A [`TaskScheduler`] implementation running on a Tokio `Handle`.
///
/// Each scheduled task gets a slot in a [`DashMap`] keyed by slot index; the slot's
/// generation is bumped every time it is reused so a [`TaskHandle`] captured before
/// reuse can never cancel the wrong task.
pub struct TokioTaskScheduler {
    runtime: tokio::runtime::Handle,
    clock: SystemClock,
    slots: Arc<DashMap<u32, Slot>>,
    generations: Arc<DashMap<u32, u32>>,
    free_slots: Arc<Mutex<Vec<u32>>>,
    next_slot: AtomicU32,
}

impl TokioTaskScheduler {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        TokioTaskScheduler {
            runtime,
            clock: SystemClock::default(),
            slots: Arc::new(DashMap::new()),
            generations: Arc::new(DashMap::new()),
            free_slots: Arc::new(Mutex::new(Vec::new())),
            next_slot: AtomicU32::new(0),
        }
    }

    /// Allocates a slot, preferring one freed by a completed task so generations
    /// actually get exercised instead of growing the table unbounded.
    fn allocate_slot(&self) -> (u32, u32) {
        let slot = self
            .free_slots
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| self.next_slot.fetch_add(1, Ordering::Relaxed));
        let generation = {
            let mut entry = self.generations.entry(slot).or_insert(0);
            if *entry > 0 {
                *entry = entry.wrapping_add(1);
            }
            *entry
        };
        (slot, generation)
    }

    fn schedule(
        &self,
        delay: Option<Duration>,
        _priority: TaskPriority,
        work: ScheduledFn,
    ) -> Result<TaskHandle> {
        let (slot, generation) = self.allocate_slot();
        let (cancel_tx, mut cancel_rx) = tokio::sync::oneshot::channel();
        self.slots.insert(
            slot,
            Slot {
                generation,
                cancel_tx: Some(cancel_tx),
            },
        );

        let slots = self.slots.clone();
        let free_slots = self.free_slots.clone();
        self.runtime.spawn(async move {
            if let Some(delay) = delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = &mut cancel_rx => {
                        slots.remove(&slot);
                        free_slots.lock().unwrap().push(slot);
                        return;
                    }
                }
            } else if cancel_rx.try_recv().is_ok() {
                slots.remove(&slot);
                free_slots.lock().unwrap().push(slot);
                return;
            }
            work();
            slots.remove_if(&slot, |_, s| s.generation == generation);
            free_slots.lock().unwrap().push(slot);
        });

        Ok(TaskHandle::new(slot, generation))
    }
}

impl TaskScheduler for TokioTaskScheduler {
    fn run_now(&self, priority: TaskPriority, work: ScheduledFn) -> Result<TaskHandle> {
        self.schedule(None, priority, work)
    }

    fn run_at(&self, at: MonotonicTimePoint, priority: TaskPriority, work: ScheduledFn) -> Result<TaskHandle> {
        let now = self.clock.now();
        let delay = at.saturating_duration_since(now);
        self.schedule(Some(delay), priority, work)
    }

    fn cancel(&self, handle: TaskHandle) -> CancelOutcome {
        match self.slots.get_mut(&handle.slot()) {
            Some(mut entry) if entry.generation == handle.generation() => {
                if let Some(tx) = entry.cancel_tx.take() {
                    let _ = tx.send(());
                    CancelOutcome::Cancelled
                } else {
                    CancelOutcome::AlreadyCompleted
                }
            }
            Some(_) => CancelOutcome::Stale,
            None => CancelOutcome::AlreadyCompleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn run_now_executes_once() {
        let scheduler = TokioTaskScheduler::new(tokio::runtime::Handle::current());
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        scheduler.run_now(TaskPriority::Normal, Box::new(move || {
            flag.store(true, Ordering::SeqCst);
        })).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancel_before_run_prevents_execution() {
        let scheduler = TokioTaskScheduler::new(tokio::runtime::Handle::current());
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let handle = scheduler
            .run_at(
                scheduler.clock.now().checked_add(Duration::from_millis(50)).unwrap(),
                TaskPriority::Normal,
                Box::new(move || flag.store(true, Ordering::SeqCst)),
            )
            .unwrap();
        assert_eq!(scheduler.cancel(handle), CancelOutcome::Cancelled);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn stale_handle_after_slot_reuse_is_reported_stale() {
        let scheduler = TokioTaskScheduler::new(tokio::runtime::Handle::current());
        let handle = scheduler.run_now(TaskPriority::Normal, Box::new(|| {})).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(scheduler.cancel(handle), CancelOutcome::AlreadyCompleted);
    }
}
