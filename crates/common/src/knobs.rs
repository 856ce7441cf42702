//! Tunable limits and parameters for the storage node.
//!
//! Every knob here should have a comment explaining what it's for and the
//! upper/lower bounds if applicable so an oncall engineer can adjust these
//! safely if needed. Each can be overridden with an environment variable.
#![deny(missing_docs)]

use std::{
    sync::LazyLock,
    time::Duration,
};

use cmd_util::env::env_config;

/// Hard per-invocation timeout for scheduler task actions. An action that
/// exceeds it is cancelled and counted; the task itself keeps running.
pub static TASK_ACTION_TIMEOUT: LazyLock<Duration> =
    LazyLock::new(|| Duration::from_secs(env_config("TASK_ACTION_TIMEOUT_SECS", 300)));

/// Maximum distance between an ingested element timestamp and the node's
/// wall clock, in either direction. Elements outside the window are rejected
/// as clock skew.
pub static MAX_TIMESTAMP_DRIFT: LazyLock<Duration> =
    LazyLock::new(|| Duration::from_secs(env_config("MAX_TIMESTAMP_DRIFT_SECS", 24 * 60 * 60)));

/// How many element batches the write path keeps pooled for reuse. Excess
/// batches released while the pool is full are dropped.
pub static ELEMENT_BATCH_POOL_CAPACITY: LazyLock<usize> =
    LazyLock::new(|| env_config("ELEMENT_BATCH_POOL_CAPACITY", 1024));
