//! Delayed task execution with cancel-before-start semantics.
//!
//! [`TokioScheduler`] runs tasks on the tokio runtime. [`ManualScheduler`]
//! queues them against a [`ManualClock`] so tests decide when time passes.

use filemark_types::{Clock, ManualClock};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::warn;

const PENDING: u8 = 0;
const STARTED: u8 = 1;
const CANCELLED: u8 = 2;

/// Handle to a scheduled task.
#[derive(Clone, Debug)]
pub struct ScheduledTask {
    state: Arc<AtomicU8>,
}

impl ScheduledTask {
    fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(PENDING)),
        }
    }

    /// Prevents the task from starting. Returns `false` if it already started
    /// or was already cancelled.
    pub fn cancel(&self) -> bool {
        self.state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    pub fn has_started(&self) -> bool {
        self.state.load(Ordering::Acquire) == STARTED
    }

    /// Claims the task for execution.
    fn begin(&self) -> bool {
        self.state
            .compare_exchange(PENDING, STARTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Runs a future after a delay unless cancelled first.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> ScheduledTask;
}

/// Scheduler backed by `tokio::spawn` and `tokio::time::sleep`.
#[derive(Clone, Debug, Default)]
pub struct TokioScheduler {
    handle: Option<Handle>,
}

impl TokioScheduler {
    /// Uses the runtime of the calling context, if any, falling back to the
    /// runtime current at each `schedule` call.
    pub fn new() -> Self {
        Self {
            handle: Handle::try_current().ok(),
        }
    }

    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> ScheduledTask {
        let scheduled = ScheduledTask::new();
        let Some(handle) = self.handle.clone().or_else(|| Handle::try_current().ok()) else {
            warn!("no tokio runtime available, dropping scheduled task");
            scheduled.cancel();
            return scheduled;
        };

        let claim = scheduled.clone();
        handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if claim.begin() {
                task.await;
            }
        });
        scheduled
    }
}

struct QueuedTask {
    due: i64,
    seq: u64,
    handle: ScheduledTask,
    task: BoxFuture<'static, ()>,
}

#[derive(Default)]
struct Queue {
    next_seq: u64,
    tasks: Vec<QueuedTask>,
}

/// Deterministic scheduler for tests.
///
/// Tasks run only from [`ManualScheduler::run_due`] or
/// [`ManualScheduler::advance`], in due-time order, on the caller's task.
pub struct ManualScheduler {
    clock: Arc<ManualClock>,
    queue: Mutex<Queue>,
}

impl ManualScheduler {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            queue: Mutex::new(Queue::default()),
        }
    }

    /// Number of queued tasks that have not been cancelled.
    pub fn pending(&self) -> usize {
        self.lock()
            .tasks
            .iter()
            .filter(|t| t.handle.is_pending())
            .count()
    }

    /// Due time of the earliest pending task.
    pub fn next_due(&self) -> Option<i64> {
        self.lock()
            .tasks
            .iter()
            .filter(|t| t.handle.is_pending())
            .map(|t| t.due)
            .min()
    }

    /// Moves the clock forward and runs every task that became due.
    pub async fn advance(&self, by: Duration) -> usize {
        self.clock.advance(by);
        self.run_due().await
    }

    /// Runs due tasks, including ones they schedule, until none is due.
    /// Returns how many ran.
    pub async fn run_due(&self) -> usize {
        let mut ran = 0;
        while let Some(next) = self.take_next_due() {
            if next.handle.begin() {
                next.task.await;
                ran += 1;
            }
        }
        ran
    }

    fn take_next_due(&self) -> Option<QueuedTask> {
        let now = self.clock.now_millis();
        let mut queue = self.lock();
        queue.tasks.retain(|t| !t.handle.is_cancelled());
        let index = queue
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, _)| i)?;
        Some(queue.tasks.remove(index))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> ScheduledTask {
        let handle = ScheduledTask::new();
        let delay_millis = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let due = self.clock.now_millis().saturating_add(delay_millis);
        let mut queue = self.lock();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.tasks.push(QueuedTask {
            due,
            seq,
            handle: handle.clone(),
            task,
        });
        handle
    }
}
