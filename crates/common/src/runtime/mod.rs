//! Clock abstraction for everything in the engine that sleeps or reads the
//! wall clock. Production code runs on [`RealClock`]; time-dependent tests
//! and the scheduler's trigger path run on the caller-driven [`MockClock`].

use std::{
    future::Future,
    pin::Pin,
    time::{
        Duration,
        SystemTime,
    },
};

use futures::{
    future::FusedFuture,
    FutureExt,
};
use tokio::sync::watch;

mod mock;

pub use self::mock::MockClock;

/// A one-shot wake, resolved once the owning clock has advanced past the
/// requested deadline. Dropping it cancels the wait.
pub type SleepFuture = Pin<Box<dyn FusedFuture<Output = ()> + Send + 'static>>;

/// A monotonic time source. Functionality that sleeps must go through this
/// trait so it can run against virtualized time in tests and so the
/// scheduler can re-synchronise a task's clock on demand.
pub trait Clock: Send + Sync + 'static {
    /// Return (a potentially-virtualized) system time. Compare with
    /// `std::time::UNIX_EPOCH` to obtain a Unix timestamp.
    fn now(&self) -> SystemTime;

    /// Sleep for the given duration.
    fn sleep(&self, duration: Duration) -> SleepFuture;

    /// Mock clocks return themselves for caller-driven advancement.
    fn as_mock(&self) -> Option<&MockClock> {
        None
    }
}

/// Wall-clock time and tokio timers.
#[derive(Clone, Copy, Default)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, duration: Duration) -> SleepFuture {
        Box::pin(tokio::time::sleep(duration).fuse())
    }
}

/// Wraps `tokio::spawn` so call sites carry a stable name for their task.
pub fn tokio_spawn<F>(name: &'static str, f: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tracing::trace!("spawning {name}");
    tokio::spawn(f)
}

/// Cooperative shutdown: signal once, observe from many places. Observers
/// that subscribe after the close still see it.
#[derive(Clone)]
pub struct Closer {
    tx: watch::Sender<bool>,
}

impl Closer {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Signal shutdown. Idempotent.
    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`Closer::close`] has been called.
    pub fn wait_closed(&self) -> SleepFuture {
        let mut rx = self.tx.subscribe();
        Box::pin(
            async move {
                // `wait_for` returns immediately if the value is already true.
                let _ = rx.wait_for(|closed| *closed).await;
            }
            .fuse(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{
        Clock,
        Closer,
        MockClock,
    };

    #[tokio::test]
    async fn test_closer_wakes_existing_and_late_waiters() {
        let closer = Closer::new();
        let early = closer.wait_closed();
        closer.close();
        early.await;
        assert!(closer.is_closed());
        closer.wait_closed().await;
    }

    #[tokio::test]
    async fn test_mock_clock_sleep_satisfied_by_advance() {
        let clock = MockClock::new();
        let sleep = clock.sleep(Duration::from_secs(5));
        clock.advance(Duration::from_secs(5));
        sleep.await;
    }
}
