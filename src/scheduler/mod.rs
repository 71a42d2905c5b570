//! # Prune Scheduling
//!
//! Time-based caches only shrink when something calls `prune()`. This module
//! provides the "something": a periodic task runner with one worker.
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                       Scheduler (trait)                          │
//!   │   schedule(task, period) → ScheduleHandle                        │
//!   └───────────────┬──────────────────────────────┬───────────────────┘
//!                   │                              │
//!                   ▼                              ▼
//!   ┌───────────────────────────────┐  ┌───────────────────────────────┐
//!   │ PruneScheduler                │  │ ManualScheduler               │
//!   │  one background thread        │  │  no thread; advance(d) runs   │
//!   │  init / shutdown / shutdown_now│  │  due tasks on the caller      │
//!   └───────────────────────────────┘  └───────────────────────────────┘
//!                   ▲
//!                   │ lazily created, process-wide
//!               global()
//! ```
//!
//! Tasks run with a fixed period, first run one period after scheduling.
//! Each run is isolated: a panicking task is logged and keeps its schedule,
//! and other tasks are unaffected.
//!
//! Prefer passing a scheduler into the cache that needs it. [`global`] exists
//! for applications that want one process-wide worker; its lifecycle
//! (`init`, `shutdown`) is then the application's to manage.

mod manual;
mod worker;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;

use once_cell::sync::Lazy;

use crate::error::ScheduleError;
use crate::listener::panic_message;

pub use manual::ManualScheduler;
pub use worker::PruneScheduler;

/// A unit of periodic work, typically a closure calling a cache's `prune()`.
pub type PruneTask = Arc<dyn Fn() + Send + Sync>;

/// Identifies a scheduled task within its scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Runs tasks periodically.
pub trait Scheduler: Send + Sync {
    /// Registers `task` to run every `period`, first run after one period.
    fn schedule(&self, task: PruneTask, period: Duration) -> Result<ScheduleHandle, ScheduleError>;
}

/// A task that was registered but will not run again, as returned by
/// [`PruneScheduler::shutdown_now`].
pub struct PendingTask {
    pub id: TaskId,
    pub period: Duration,
    pub task: PruneTask,
}

impl fmt::Debug for PendingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTask")
            .field("id", &self.id)
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

/// Scheduler side of a handle: removes a task by id.
pub(crate) trait Cancel: Send + Sync {
    fn cancel(&self, id: TaskId) -> bool;
}

/// Cancellation handle for one scheduled task.
///
/// Dropping the handle does *not* cancel the task. Handles outlive their
/// scheduler safely: cancelling after the scheduler is gone returns `false`.
#[must_use = "dropping a ScheduleHandle leaves the task running with no way to cancel it"]
pub struct ScheduleHandle {
    id: TaskId,
    owner: Weak<dyn Cancel>,
}

impl ScheduleHandle {
    pub(crate) fn new(id: TaskId, owner: Weak<dyn Cancel>) -> Self {
        Self { id, owner }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Stops future runs. Returns `true` if the task was still registered.
    pub fn cancel(&self) -> bool {
        self.owner
            .upgrade()
            .is_some_and(|owner| owner.cancel(self.id))
    }
}

impl fmt::Debug for ScheduleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleHandle")
            .field("id", &self.id)
            .field("live", &(self.owner.strong_count() > 0))
            .finish()
    }
}

static GLOBAL: Lazy<PruneScheduler> = Lazy::new(PruneScheduler::new);

/// The process-wide prune scheduler.
///
/// Created on first use; its worker thread starts with the first scheduled
/// task or an explicit [`init`](PruneScheduler::init).
pub fn global() -> &'static PruneScheduler {
    &GLOBAL
}

/// Runs one task, logging instead of propagating a panic.
pub(crate) fn run_isolated(id: TaskId, task: &PruneTask) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task())) {
        tracing::error!(
            task = %id,
            panic = %panic_message(payload.as_ref()),
            "scheduled prune task panicked; keeping its schedule"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Never;

    impl Cancel for Never {
        fn cancel(&self, _id: TaskId) -> bool {
            true
        }
    }

    #[test]
    fn handle_cancel_after_owner_dropped_is_false() {
        let owner: Arc<dyn Cancel> = Arc::new(Never);
        let handle = ScheduleHandle::new(TaskId(1), Arc::downgrade(&owner));
        assert!(handle.cancel());
        drop(owner);
        assert!(!handle.cancel());
    }

    #[test]
    fn run_isolated_swallows_panics() {
        let task: PruneTask = Arc::new(|| panic!("prune failed"));
        run_isolated(TaskId(9), &task);
    }

    #[test]
    fn task_id_display() {
        assert_eq!(TaskId(3).to_string(), "task-3");
    }
}
