use std::sync::atomic::{
    AtomicU64,
    Ordering,
};

use metrics::{
    log_counter_with_label_values,
    log_distribution_with_label_values,
    register_rill_counter,
    register_rill_histogram,
};

const TASK_LABEL: &[&str] = &["task"];

register_rill_counter!(
    RILL_SCHEDULER_JOBS_STARTED_TOTAL,
    "Number of scheduled job loops started",
    TASK_LABEL
);
register_rill_counter!(
    RILL_SCHEDULER_JOBS_FINISHED_TOTAL,
    "Number of scheduled job loops that have exited",
    TASK_LABEL
);
register_rill_counter!(
    RILL_SCHEDULER_TASKS_STARTED_TOTAL,
    "Number of task action invocations started",
    TASK_LABEL
);
register_rill_counter!(
    RILL_SCHEDULER_TASKS_FINISHED_TOTAL,
    "Number of task action invocations finished",
    TASK_LABEL
);
register_rill_counter!(
    RILL_SCHEDULER_TASKS_PANIC_TOTAL,
    "Number of task action invocations that panicked",
    TASK_LABEL
);
register_rill_counter!(
    RILL_SCHEDULER_TASKS_TIMEOUT_TOTAL,
    "Number of task action invocations cancelled by the action timeout",
    TASK_LABEL
);
register_rill_histogram!(
    RILL_SCHEDULER_TASK_LATENCY_SECONDS,
    "Latency of task action invocations in seconds",
    TASK_LABEL
);

/// Per-task counters mirrored into process memory so `Scheduler::metrics`
/// can hand back a snapshot without scraping prometheus.
#[derive(Debug, Default)]
pub struct TaskMetrics {
    pub total_jobs_started: AtomicU64,
    pub total_jobs_finished: AtomicU64,
    pub total_tasks_started: AtomicU64,
    pub total_tasks_finished: AtomicU64,
    pub total_tasks_panic: AtomicU64,
    pub total_tasks_timeout: AtomicU64,
    pub total_task_latency_ns: AtomicU64,
}

impl TaskMetrics {
    pub(crate) fn log_job_started(&self, task: &str) {
        self.total_jobs_started.fetch_add(1, Ordering::Relaxed);
        log_counter_with_label_values(&RILL_SCHEDULER_JOBS_STARTED_TOTAL, 1, &[task]);
    }

    pub(crate) fn log_job_finished(&self, task: &str) {
        self.total_jobs_finished.fetch_add(1, Ordering::Relaxed);
        log_counter_with_label_values(&RILL_SCHEDULER_JOBS_FINISHED_TOTAL, 1, &[task]);
    }

    pub(crate) fn log_task_started(&self, task: &str) {
        self.total_tasks_started.fetch_add(1, Ordering::Relaxed);
        log_counter_with_label_values(&RILL_SCHEDULER_TASKS_STARTED_TOTAL, 1, &[task]);
    }

    pub(crate) fn log_task_finished(&self, task: &str, latency: std::time::Duration) {
        self.total_tasks_finished.fetch_add(1, Ordering::Relaxed);
        self.total_task_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        log_counter_with_label_values(&RILL_SCHEDULER_TASKS_FINISHED_TOTAL, 1, &[task]);
        log_distribution_with_label_values(
            &RILL_SCHEDULER_TASK_LATENCY_SECONDS,
            latency.as_secs_f64(),
            &[task],
        );
    }

    pub(crate) fn log_task_panic(&self, task: &str) {
        self.total_tasks_panic.fetch_add(1, Ordering::Relaxed);
        log_counter_with_label_values(&RILL_SCHEDULER_TASKS_PANIC_TOTAL, 1, &[task]);
    }

    pub(crate) fn log_task_timeout(&self, task: &str) {
        self.total_tasks_timeout.fetch_add(1, Ordering::Relaxed);
        log_counter_with_label_values(&RILL_SCHEDULER_TASKS_TIMEOUT_TOTAL, 1, &[task]);
    }
}
