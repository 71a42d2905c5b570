//! Deterministic scheduler for tests: time only moves when told to.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::ScheduleError;
use crate::scheduler::{run_isolated, Cancel, PruneTask, ScheduleHandle, Scheduler, TaskId};

struct Slot {
    task: PruneTask,
    period: Duration,
    due: Duration,
}

#[derive(Default)]
struct Inner {
    now: Duration,
    next_id: u64,
    slots: FxHashMap<TaskId, Slot>,
}

#[derive(Default)]
struct Tasks(Mutex<Inner>);

impl Cancel for Tasks {
    fn cancel(&self, id: TaskId) -> bool {
        self.0.lock().slots.remove(&id).is_some()
    }
}

/// A [`Scheduler`] driven by [`advance`](Self::advance).
///
/// Tasks run on the thread calling `advance`, in due-time order, with a task
/// that falls due several times within one advance running once per period.
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
/// use stashkit::scheduler::{ManualScheduler, Scheduler};
///
/// let scheduler = ManualScheduler::new();
/// let runs = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&runs);
/// let _handle = scheduler
///     .schedule(Arc::new(move || { counter.fetch_add(1, Ordering::SeqCst); }), Duration::from_secs(10))
///     .unwrap();
///
/// assert_eq!(scheduler.advance(Duration::from_secs(9)), 0);
/// assert_eq!(scheduler.advance(Duration::from_secs(25)), 3);
/// assert_eq!(runs.load(Ordering::SeqCst), 3);
/// ```
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Arc<Tasks>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves virtual time forward and runs every task that falls due.
    /// Returns the number of task runs.
    pub fn advance(&self, by: Duration) -> usize {
        let target = {
            let mut inner = self.tasks.0.lock();
            inner.now = inner.now.saturating_add(by);
            inner.now
        };

        let mut runs = 0;
        loop {
            let next = {
                let mut inner = self.tasks.0.lock();
                let due = inner
                    .slots
                    .iter()
                    .filter(|(_, slot)| slot.due <= target)
                    .min_by_key(|(id, slot)| (slot.due, **id))
                    .map(|(id, _)| *id);
                due.and_then(|id| {
                    let slot = inner.slots.get_mut(&id)?;
                    let task = Arc::clone(&slot.task);
                    match slot.due.checked_add(slot.period) {
                        Some(next) => slot.due = next,
                        // last run this clock can express
                        None => {
                            inner.slots.remove(&id);
                        },
                    }
                    Some((id, task))
                })
            };
            let Some((id, task)) = next else {
                break;
            };
            run_isolated(id, &task);
            runs += 1;
        }
        runs
    }

    /// Virtual time elapsed since construction.
    pub fn elapsed(&self) -> Duration {
        self.tasks.0.lock().now
    }

    pub fn task_count(&self) -> usize {
        self.tasks.0.lock().slots.len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, task: PruneTask, period: Duration) -> Result<ScheduleHandle, ScheduleError> {
        if period.is_zero() {
            return Err(ScheduleError::ZeroPeriod);
        }
        let id = {
            let mut inner = self.tasks.0.lock();
            let due = inner.now.checked_add(period).ok_or(ScheduleError::PeriodTooLong)?;
            let id = TaskId(inner.next_id);
            inner.next_id += 1;
            inner.slots.insert(id, Slot { task, period, due });
            id
        };
        let owner: Arc<dyn Cancel> = self.tasks.clone();
        Ok(ScheduleHandle::new(id, Arc::downgrade(&owner)))
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.tasks.0.lock();
        f.debug_struct("ManualScheduler")
            .field("elapsed", &inner.now)
            .field("tasks", &inner.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    #[test]
    fn tasks_run_in_due_order() {
        let scheduler = ManualScheduler::new();
        let order = Arc::new(PlMutex::new(Vec::new()));

        for (name, secs) in [("slow", 3u64), ("fast", 2)] {
            let log = Arc::clone(&order);
            let _ = scheduler
                .schedule(Arc::new(move || log.lock().push(name)), Duration::from_secs(secs))
                .unwrap();
        }

        scheduler.advance(Duration::from_secs(4));
        // fast@2, slow@3, fast@4
        assert_eq!(*order.lock(), vec!["fast", "slow", "fast"]);
    }

    #[test]
    fn cancel_removes_task() {
        let scheduler = ManualScheduler::new();
        let handle = scheduler
            .schedule(Arc::new(|| {}), Duration::from_secs(1))
            .unwrap();
        assert_eq!(scheduler.task_count(), 1);
        assert!(handle.cancel());
        assert_eq!(scheduler.advance(Duration::from_secs(5)), 0);
    }

    #[test]
    fn panicking_task_keeps_its_schedule() {
        let scheduler = ManualScheduler::new();
        let _handle = scheduler
            .schedule(Arc::new(|| panic!("boom")), Duration::from_secs(1))
            .unwrap();
        assert_eq!(scheduler.advance(Duration::from_secs(2)), 2);
        assert_eq!(scheduler.task_count(), 1);
    }

    #[test]
    fn task_may_cancel_itself() {
        let scheduler = Arc::new(ManualScheduler::new());
        let slot: Arc<PlMutex<Option<ScheduleHandle>>> = Arc::new(PlMutex::new(None));
        let inner = Arc::clone(&slot);
        let handle = scheduler
            .schedule(
                Arc::new(move || {
                    if let Some(handle) = inner.lock().as_ref() {
                        handle.cancel();
                    }
                }),
                Duration::from_secs(1),
            )
            .unwrap();
        *slot.lock() = Some(handle);

        assert_eq!(scheduler.advance(Duration::from_secs(10)), 1);
        assert_eq!(scheduler.task_count(), 0);
    }

    #[test]
    fn zero_period_rejected() {
        let scheduler = ManualScheduler::new();
        assert_eq!(
            scheduler
                .schedule(Arc::new(|| {}), Duration::ZERO)
                .unwrap_err(),
            ScheduleError::ZeroPeriod
        );
    }

    #[test]
    fn overlong_period_rejected() {
        let scheduler = ManualScheduler::new();
        scheduler.advance(Duration::from_secs(1));
        assert_eq!(
            scheduler
                .schedule(Arc::new(|| {}), Duration::MAX)
                .unwrap_err(),
            ScheduleError::PeriodTooLong
        );
        assert_eq!(scheduler.task_count(), 0);
    }

    #[test]
    fn task_retires_once_its_next_run_overflows() {
        let scheduler = ManualScheduler::new();
        let _handle = scheduler
            .schedule(Arc::new(|| {}), Duration::MAX / 2)
            .unwrap();

        // runs at P and 2P; 3P is past Duration::MAX
        assert_eq!(scheduler.advance(Duration::MAX), 2);
        assert_eq!(scheduler.task_count(), 0);
        assert_eq!(scheduler.advance(Duration::from_secs(1)), 0);
    }
}
