//! The housekeeping scheduler: a registry of named, cron-scheduled tasks
//! driving segment rotation, retention, and compaction triggers.
//!
//! Each task runs as its own loop, sleeping on a [`Clock`] until the next
//! fire. A scheduler constructed over a mock clock hands every task a fresh
//! mock clock of its own, which [`Scheduler::trigger`] can re-synchronise to
//! fire tasks deterministically in tests.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{
        Duration,
        SystemTime,
    },
};

use common::runtime::{
    tokio_spawn,
    Clock,
    Closer,
};
use parking_lot::RwLock;
use tokio::task::JoinHandle;

mod metrics;
mod schedule;
mod task;

pub use crate::{
    metrics::TaskMetrics,
    schedule::{
        ParseOptions,
        Schedule,
        ScheduleParseError,
    },
    task::TaskAction,
};

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("scheduler is closed")]
    Closed,
    #[error("task {0} is already registered")]
    Duplicate(String),
    #[error(transparent)]
    Parse(#[from] ScheduleParseError),
}

struct TaskEntry {
    epoch: u64,
    closer: Closer,
    clock: Arc<dyn Clock>,
    schedule: Schedule,
    metrics: Arc<TaskMetrics>,
    join: JoinHandle<()>,
}

struct SchedulerState {
    closed: bool,
    next_epoch: u64,
    tasks: HashMap<String, TaskEntry>,
}

struct SchedulerInner {
    clock: Arc<dyn Clock>,
    state: RwLock<SchedulerState>,
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                clock,
                state: RwLock::new(SchedulerState {
                    closed: false,
                    next_epoch: 0,
                    tasks: HashMap::new(),
                }),
            }),
        }
    }

    /// Parse `expr` per `options` and start a task loop for `action` under
    /// `name`. Names are unique while their task is registered; the entry is
    /// removed once the loop exits.
    pub fn register(
        &self,
        name: impl Into<String>,
        options: ParseOptions,
        expr: &str,
        action: impl TaskAction,
    ) -> Result<(), RegisterError> {
        let name = name.into();
        let schedule = Schedule::parse(expr, options)?;

        let mut state = self.inner.state.write();
        if state.closed {
            return Err(RegisterError::Closed);
        }
        if state.tasks.contains_key(&name) {
            return Err(RegisterError::Duplicate(name));
        }
        let epoch = state.next_epoch;
        state.next_epoch += 1;

        // Tasks on a mock-backed scheduler get their own clock so one task's
        // triggering never disturbs another's pending sleep.
        let task_clock: Arc<dyn Clock> = match self.inner.clock.as_mock() {
            Some(mock) => Arc::new(mock.fork()),
            None => self.inner.clock.clone(),
        };
        let closer = Closer::new();
        let metrics = Arc::new(TaskMetrics::default());
        let task = task::Task::new(
            name.clone(),
            schedule.clone(),
            Arc::new(action),
            task_clock.clone(),
            closer.clone(),
            metrics.clone(),
        );

        let inner = Arc::downgrade(&self.inner);
        let loop_name = name.clone();
        let join = tokio_spawn("scheduler_task_loop", async move {
            task.run().await;
            // Deregister ourselves, unless close() already drained the map
            // or the name was re-registered in the meantime.
            if let Some(inner) = inner.upgrade() {
                let mut state = inner.state.write();
                if state
                    .tasks
                    .get(&loop_name)
                    .is_some_and(|entry| entry.epoch == epoch)
                {
                    state.tasks.remove(&loop_name);
                }
            }
        });
        state.tasks.insert(
            name,
            TaskEntry {
                epoch,
                closer,
                clock: task_clock,
                schedule,
                metrics,
                join,
            },
        );
        Ok(())
    }

    /// Re-synchronise the named task's clock to this scheduler's current
    /// time, satisfying its pending sleep. Only meaningful for mock-backed
    /// schedulers; returns false on real clocks and unknown names.
    pub fn trigger(&self, name: &str) -> bool {
        let Some(scheduler_mock) = self.inner.clock.as_mock() else {
            return false;
        };
        let now = scheduler_mock.now();
        let state = self.inner.state.read();
        let Some(entry) = state.tasks.get(name) else {
            return false;
        };
        let Some(task_mock) = entry.clock.as_mock() else {
            return false;
        };
        task_mock.set(now);
        true
    }

    /// The gap between the named task's next two fires, plus the first fire
    /// time.
    pub fn interval(&self, name: &str) -> Option<(Duration, SystemTime)> {
        let state = self.inner.state.read();
        let entry = state.tasks.get(name)?;
        let now = entry.clock.now();
        let first = entry.schedule.next_after(now)?;
        let second = entry.schedule.next_after(first)?;
        Some((
            second.duration_since(first).unwrap_or_default(),
            first,
        ))
    }

    pub fn metrics(&self) -> HashMap<String, Arc<TaskMetrics>> {
        let state = self.inner.state.read();
        state
            .tasks
            .iter()
            .map(|(name, entry)| (name.clone(), entry.metrics.clone()))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.read().closed
    }

    pub fn len(&self) -> usize {
        self.inner.state.read().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signal every task to stop and wait for each loop to exit. Subsequent
    /// registrations fail with [`RegisterError::Closed`]. Idempotent.
    pub async fn close(&self) {
        let entries: Vec<TaskEntry> = {
            let mut state = self.inner.state.write();
            state.closed = true;
            state.tasks.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &entries {
            entry.closer.close();
        }
        for entry in entries {
            if let Err(e) = entry.join.await {
                if e.is_panic() {
                    tracing::error!("task loop panicked during close: {e}");
                }
            }
        }
    }

    /// The clock a registered task sleeps on. Test introspection.
    #[cfg(any(test, feature = "testing"))]
    pub fn task_clock(&self, name: &str) -> Option<Arc<dyn Clock>> {
        let state = self.inner.state.read();
        state.tasks.get(name).map(|entry| entry.clock.clone())
    }
}
