//! Repeating task scheduling for frame capture.
//!
//! Live recording renders the view once per frame period. The pacing source
//! is a [`Scheduler`], so it can be a background thread in production or a
//! [`ManualScheduler`] stepped by hand in tests.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

/// What a repeating task wants after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    /// Keep ticking.
    Continue,

    /// Stop; the task will not be called again.
    Stop,
}

/// A task invoked once per period.
pub type RepeatingTask = Box<dyn FnMut() -> TickControl + Send + 'static>;

/// Source of periodic ticks.
pub trait Scheduler: Send + Sync {
    /// Run `task` every `period` until it returns [`TickControl::Stop`] or
    /// the returned handle is cancelled.
    fn schedule_repeating(&self, period: Duration, task: RepeatingTask) -> io::Result<TaskHandle>;
}

/// Handle to a scheduled repeating task.
///
/// Cancelling (or dropping) the handle blocks until the task has stopped and
/// its closure has been dropped, so no tick can run afterwards.
#[must_use = "dropping a TaskHandle cancels the task"]
pub struct TaskHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TaskHandle {
    /// Create a handle from a cancellation routine.
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop the task and wait until it can no longer run.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

/// Runs each task on its own thread with deadline pacing.
///
/// Ticks that are missed because a task ran long are skipped rather than
/// replayed in a burst.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScheduler;

impl ThreadScheduler {
    /// Create a thread scheduler.
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule_repeating(
        &self,
        period: Duration,
        mut task: RepeatingTask,
    ) -> io::Result<TaskHandle> {
        let period = period.max(Duration::from_micros(1));
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        let thread = thread::Builder::new()
            .name("viewcap-capture".to_string())
            .spawn(move || {
                debug!(period_us = period.as_micros() as u64, "Capture ticker starting");
                let mut next_tick = Instant::now() + period;
                let mut ticks: u64 = 0;

                loop {
                    match stop_rx.recv_deadline(next_tick) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    ticks += 1;
                    if task() == TickControl::Stop {
                        debug!(ticks, "Task requested stop");
                        break;
                    }

                    next_tick += period;
                    let now = Instant::now();
                    if next_tick <= now {
                        let behind = now.duration_since(next_tick).as_nanos();
                        let missed = (behind / period.as_nanos()) as u32 + 1;
                        next_tick += period * missed;
                        trace!(missed, "Ticker fell behind, skipping ticks");
                    }
                }

                debug!(ticks, "Capture ticker stopped");
            })?;

        Ok(TaskHandle::new(move || {
            let _ = stop_tx.try_send(());
            if thread.join().is_err() {
                warn!("Capture ticker panicked");
            }
        }))
    }
}

struct ManualTask {
    id: u64,
    period: Duration,
    task: RepeatingTask,
}

#[derive(Default)]
struct ManualTasks {
    next_id: u64,
    tasks: Vec<ManualTask>,
}

/// A scheduler whose tasks only run when [`ManualScheduler::tick`] is called.
///
/// Clones share the same task list.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<Mutex<ManualTasks>>,
}

impl ManualScheduler {
    /// Create an empty manual scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every scheduled task once. Returns how many tasks ran.
    pub fn tick(&self) -> usize {
        let mut inner = self.inner.lock();
        let ran = inner.tasks.len();
        inner
            .tasks
            .retain_mut(|entry| (entry.task)() == TickControl::Continue);
        ran
    }

    /// Tick `n` times. Returns the total number of task invocations.
    pub fn tick_n(&self, n: usize) -> usize {
        (0..n).map(|_| self.tick()).sum()
    }

    /// Number of tasks still scheduled.
    pub fn active_tasks(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    /// Periods of the scheduled tasks, in scheduling order.
    pub fn periods(&self) -> Vec<Duration> {
        self.inner.lock().tasks.iter().map(|t| t.period).collect()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, period: Duration, task: RepeatingTask) -> io::Result<TaskHandle> {
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.tasks.push(ManualTask { id, period, task });
            id
        };

        let inner = Arc::clone(&self.inner);
        Ok(TaskHandle::new(move || {
            // Drop the closure outside the lock.
            let removed: Vec<ManualTask> = {
                let mut guard = inner.lock();
                let (removed, kept) = std::mem::take(&mut guard.tasks)
                    .into_iter()
                    .partition(|t| t.id == id);
                guard.tasks = kept;
                removed
            };
            drop(removed);
        }))
    }
}
