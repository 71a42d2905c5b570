//! Thread-backed scheduler with a single worker.
//!
//! ```text
//!   State (behind one Mutex + Condvar)
//!   ┌─────────────────────────────────────────────────────────┐
//!   │ queue:  min-heap of (due, id)      may hold cancelled ids│
//!   │ tasks:  id → (task, period)        authoritative         │
//!   │ stopping: bool                                           │
//!   └─────────────────────────────────────────────────────────┘
//!
//!   worker loop:
//!     wait until queue top is due (or woken by schedule/shutdown)
//!     pop (due, id); skip if id no longer in tasks
//!     push (next due, id), then run the task with the lock released
//! ```
//!
//! A task that overruns its period is not run back-to-back to catch up; its
//! next run is one period after the late run started.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use rustc_hash::FxHashMap;

use crate::error::ScheduleError;
use crate::scheduler::{
    run_isolated, Cancel, PendingTask, PruneTask, ScheduleHandle, Scheduler, TaskId,
};

const WORKER_NAME: &str = "stashkit-prune";

struct Registered {
    task: PruneTask,
    period: Duration,
}

#[derive(Default)]
struct State {
    queue: BinaryHeap<Reverse<(Instant, TaskId)>>,
    tasks: FxHashMap<TaskId, Registered>,
    next_id: u64,
    stopping: bool,
}

struct Shared {
    state: Mutex<State>,
    wake: Condvar,
}

impl Cancel for Shared {
    fn cancel(&self, id: TaskId) -> bool {
        let removed = self.state.lock().tasks.remove(&id).is_some();
        if removed {
            tracing::debug!(task = %id, "prune task cancelled");
        }
        removed
    }
}

struct Worker {
    shared: Arc<Shared>,
    thread: JoinHandle<()>,
}

enum Lifecycle {
    Idle,
    Running(Worker),
    Stopped,
}

/// Periodic task runner owning exactly one background thread.
///
/// The thread is created lazily by the first [`schedule`](Scheduler::schedule)
/// or by [`init`](Self::init). After [`shutdown`](Self::shutdown) or
/// [`shutdown_now`](Self::shutdown_now) scheduling fails with
/// [`ScheduleError::Shutdown`] until `init` is called again.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
/// use stashkit::scheduler::{PruneScheduler, Scheduler};
///
/// let scheduler = PruneScheduler::new();
/// let runs = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&runs);
/// let handle = scheduler
///     .schedule(Arc::new(move || { counter.fetch_add(1, Ordering::SeqCst); }), Duration::from_millis(5))
///     .unwrap();
///
/// std::thread::sleep(Duration::from_millis(50));
/// assert!(handle.cancel());
/// scheduler.shutdown();
/// assert!(runs.load(Ordering::SeqCst) >= 1);
/// ```
pub struct PruneScheduler {
    lifecycle: Mutex<Lifecycle>,
}

impl PruneScheduler {
    pub fn new() -> Self {
        Self {
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// (Re)creates the worker. An existing worker is stopped first and its
    /// tasks are dropped. Safe to call from any thread, any number of times.
    pub fn init(&self) -> Result<(), ScheduleError> {
        let mut lifecycle = self.lifecycle.lock();
        if let Lifecycle::Running(worker) = std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            let dropped = stop(worker, false).len();
            tracing::debug!(dropped, "prune scheduler re-initialised");
        }
        *lifecycle = Lifecycle::Running(spawn_worker()?);
        Ok(())
    }

    /// Stops the worker once its current run (if any) finishes and waits for
    /// it. Registered tasks never run again.
    pub fn shutdown(&self) {
        // Joined outside the lifecycle lock: a task still running may call
        // back into this scheduler.
        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Stopped);
        if let Lifecycle::Running(worker) = previous {
            stop(worker, true);
            tracing::debug!("prune scheduler shut down");
        }
    }

    /// Stops the worker without waiting and returns the tasks that will not
    /// run again.
    pub fn shutdown_now(&self) -> Vec<PendingTask> {
        let mut lifecycle = self.lifecycle.lock();
        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(worker) => {
                let pending = stop(worker, false);
                tracing::debug!(pending = pending.len(), "prune scheduler shut down immediately");
                pending
            },
            _ => Vec::new(),
        }
    }

    /// True after a shutdown and before the next `init`.
    pub fn is_shutdown(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Stopped)
    }

    /// Number of registered tasks.
    pub fn task_count(&self) -> usize {
        match &*self.lifecycle.lock() {
            Lifecycle::Running(worker) => worker.shared.state.lock().tasks.len(),
            _ => 0,
        }
    }
}

impl Default for PruneScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for PruneScheduler {
    fn schedule(&self, task: PruneTask, period: Duration) -> Result<ScheduleHandle, ScheduleError> {
        if period.is_zero() {
            return Err(ScheduleError::ZeroPeriod);
        }
        let due = Instant::now().checked_add(period).ok_or(ScheduleError::PeriodTooLong)?;

        let mut lifecycle = self.lifecycle.lock();
        if matches!(*lifecycle, Lifecycle::Idle) {
            *lifecycle = Lifecycle::Running(spawn_worker()?);
            tracing::debug!("prune scheduler started");
        }
        let Lifecycle::Running(worker) = &*lifecycle else {
            return Err(ScheduleError::Shutdown);
        };

        let id = {
            let mut state = worker.shared.state.lock();
            let id = TaskId(state.next_id);
            state.next_id += 1;
            state.tasks.insert(id, Registered { task, period });
            state.queue.push(Reverse((due, id)));
            id
        };
        worker.shared.wake.notify_one();

        let owner: Arc<dyn Cancel> = worker.shared.clone();
        Ok(ScheduleHandle::new(id, Arc::downgrade(&owner)))
    }
}

impl Drop for PruneScheduler {
    fn drop(&mut self) {
        if let Lifecycle::Running(worker) = std::mem::replace(self.lifecycle.get_mut(), Lifecycle::Stopped) {
            stop(worker, false);
        }
    }
}

impl fmt::Debug for PruneScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.lifecycle.lock() {
            Lifecycle::Idle => "idle",
            Lifecycle::Running(_) => "running",
            Lifecycle::Stopped => "stopped",
        };
        f.debug_struct("PruneScheduler")
            .field("state", &state)
            .finish()
    }
}

fn spawn_worker() -> Result<Worker, ScheduleError> {
    let shared = Arc::new(Shared {
        state: Mutex::new(State::default()),
        wake: Condvar::new(),
    });
    let thread = {
        let shared = Arc::clone(&shared);
        thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || run(&shared))
            .map_err(|err| {
                tracing::error!(error = %err, "failed to spawn prune worker");
                ScheduleError::WorkerUnavailable
            })?
    };
    Ok(Worker { shared, thread })
}

/// Signals the worker to stop and drains its tasks. Joins when asked, unless
/// called from the worker itself.
fn stop(worker: Worker, join: bool) -> Vec<PendingTask> {
    let pending: Vec<PendingTask> = {
        let mut state = worker.shared.state.lock();
        state.stopping = true;
        state.queue.clear();
        state
            .tasks
            .drain()
            .map(|(id, registered)| PendingTask {
                id,
                period: registered.period,
                task: registered.task,
            })
            .collect()
    };
    worker.shared.wake.notify_all();

    if join && worker.thread.thread().id() != thread::current().id() {
        if worker.thread.join().is_err() {
            tracing::error!("prune worker exited with a panic");
        }
    }
    pending
}

fn run(shared: &Shared) {
    let mut state = shared.state.lock();
    loop {
        if state.stopping {
            break;
        }
        let Some(&Reverse((due, id))) = state.queue.peek() else {
            shared.wake.wait(&mut state);
            continue;
        };
        let now = Instant::now();
        if due > now {
            shared.wake.wait_until(&mut state, due);
            continue;
        }

        state.queue.pop();
        let Some(registered) = state.tasks.get(&id) else {
            continue; // cancelled
        };
        let task = Arc::clone(&registered.task);
        let period = registered.period;
        let next = match due.checked_add(period) {
            Some(next) if next > now => Some(next),
            _ => now.checked_add(period),
        };
        match next {
            Some(next) => state.queue.push(Reverse((next, id))),
            None => {
                state.tasks.remove(&id);
                tracing::debug!(task = %id, "prune task period overflows the clock; final run");
            },
        }

        MutexGuard::unlocked(&mut state, || run_isolated(id, &task));
    }
}
