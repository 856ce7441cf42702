use std::{
    sync::Arc,
    time::{
        Duration,
        SystemTime,
    },
};

use common::{
    knobs::TASK_ACTION_TIMEOUT,
    runtime::{
        tokio_spawn,
        Clock,
        Closer,
    },
};
use futures::{
    future::BoxFuture,
    select_biased,
    FutureExt,
};

use crate::{
    metrics::TaskMetrics,
    schedule::Schedule,
};

/// The work a scheduled task performs on each fire.
///
/// `now` is the task clock's reading at launch. Return `false` to
/// unschedule the task; `true` to keep firing.
pub trait TaskAction: Send + Sync + 'static {
    fn run(&self, now: SystemTime) -> BoxFuture<'static, bool>;
}

impl<F> TaskAction for F
where
    F: Fn(SystemTime) -> BoxFuture<'static, bool> + Send + Sync + 'static,
{
    fn run(&self, now: SystemTime) -> BoxFuture<'static, bool> {
        self(now)
    }
}

/// One named, cron-scheduled loop. Sleeps on its own clock until the next
/// fire, runs the action on a separate tokio task, and survives action
/// panics and overruns.
pub(crate) struct Task {
    name: String,
    schedule: Schedule,
    action: Arc<dyn TaskAction>,
    clock: Arc<dyn Clock>,
    closer: Closer,
    metrics: Arc<TaskMetrics>,
}

impl Task {
    pub(crate) fn new(
        name: String,
        schedule: Schedule,
        action: Arc<dyn TaskAction>,
        clock: Arc<dyn Clock>,
        closer: Closer,
        metrics: Arc<TaskMetrics>,
    ) -> Self {
        Self {
            name,
            schedule,
            action,
            clock,
            closer,
            metrics,
        }
    }

    pub(crate) async fn run(self) {
        self.metrics.log_job_started(&self.name);
        let mut closed = self.closer.wait_closed();
        loop {
            let now = self.clock.now();
            let Some(next) = self.schedule.next_after(now) else {
                tracing::info!("task {} has no next fire time, stopping", self.name);
                break;
            };
            let gap = next.duration_since(now).unwrap_or(Duration::ZERO);
            let mut sleep = self.clock.sleep(gap);
            select_biased! {
                _ = &mut closed => break,
                _ = sleep => {},
            }
            if !self.fire().await {
                break;
            }
        }
        self.metrics.log_job_finished(&self.name);
    }

    /// One scheduled invocation. Returns whether to keep scheduling. A
    /// running action is never interrupted by close; it is cancelled only by
    /// the action timeout.
    async fn fire(&self) -> bool {
        self.metrics.log_task_started(&self.name);
        let started_at = self.clock.now();
        let action = self.action.clone();
        let handle = tokio_spawn(
            "scheduler_task_action",
            async move { action.run(started_at).await },
        );
        let abort = handle.abort_handle();
        let mut action_result = handle.fuse();
        let mut timeout = self.clock.sleep(*TASK_ACTION_TIMEOUT);
        select_biased! {
            result = action_result => match result {
                Ok(keep_firing) => {
                    let latency = self
                        .clock
                        .now()
                        .duration_since(started_at)
                        .unwrap_or_default();
                    self.metrics.log_task_finished(&self.name, latency);
                    keep_firing
                },
                Err(e) if e.is_panic() => {
                    tracing::error!("task {} action panicked: {e}", self.name);
                    self.metrics.log_task_panic(&self.name);
                    true
                },
                // Aborted from outside the loop; keep scheduling.
                Err(_) => true,
            },
            _ = timeout => {
                tracing::warn!(
                    "task {} action exceeded {:?}, cancelling it",
                    self.name,
                    *TASK_ACTION_TIMEOUT,
                );
                self.metrics.log_task_timeout(&self.name);
                abort.abort();
                true
            },
        }
    }
}
