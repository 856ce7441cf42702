use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    sync::{
        Arc,
        LazyLock,
    },
    time::{
        Duration,
        SystemTime,
    },
};

use futures::{
    channel::oneshot,
    FutureExt,
};
use parking_lot::Mutex;

use super::{
    Clock,
    SleepFuture,
};

/// Where mock time starts unless a caller picks its own seed.
pub static MOCK_EPOCH: LazyLock<SystemTime> =
    LazyLock::new(|| SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000));

struct WaiterEntry {
    deadline: SystemTime,
    sender: oneshot::Sender<()>,
    id: u64,
}

impl PartialEq for WaiterEntry {
    fn eq(&self, other: &Self) -> bool {
        (self.id, self.deadline).eq(&(other.id, other.deadline))
    }
}
impl Eq for WaiterEntry {}
impl PartialOrd for WaiterEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for WaiterEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Note that the order is reversed here, as we want a min-heap
        (other.deadline, other.id).cmp(&(self.deadline, self.id))
    }
}

struct MockClockState {
    current_time: SystemTime,
    /// Monotonically increasing id just used for satisfying the [`Eq`]
    /// requirement on [`WaiterEntry`]
    id: u64,
    waiters: BinaryHeap<WaiterEntry>,
}

impl MockClockState {
    fn satisfy_due_waiters(&mut self) {
        while let Some(entry) = self.waiters.peek() {
            if entry.deadline > self.current_time {
                break;
            }
            let entry = self.waiters.pop().expect("peeked entry vanished");
            // The sleep future may have been dropped; that's fine.
            let _ = entry.sender.send(());
        }
    }
}

/// A deterministic clock whose advance is caller-driven. Sleepers are held
/// in a min-heap and satisfied when `advance`/`set` moves current time past
/// their deadline.
#[derive(Clone)]
pub struct MockClock {
    state: Arc<Mutex<MockClockState>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::new_at(*MOCK_EPOCH)
    }

    pub fn new_at(start: SystemTime) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockClockState {
                current_time: start,
                id: 0,
                waiters: BinaryHeap::new(),
            })),
        }
    }

    /// A fresh, independent clock seeded to this clock's current time.
    pub fn fork(&self) -> Self {
        Self::new_at(self.now())
    }

    /// Move time forward, satisfying every sleeper whose deadline falls in
    /// the interval.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.current_time += duration;
        state.satisfy_due_waiters();
    }

    /// Jump to an absolute time. Time never goes backwards: a target before
    /// the current reading leaves the clock untouched.
    pub fn set(&self, target: SystemTime) {
        let mut state = self.state.lock();
        if target <= state.current_time {
            return;
        }
        state.current_time = target;
        state.satisfy_due_waiters();
    }

    /// How many sleepers are still being awaited. Entries whose futures
    /// were dropped are pruned first. Test introspection.
    pub fn waiter_count(&self) -> usize {
        let mut state = self.state.lock();
        state.waiters.retain(|entry| !entry.sender.is_canceled());
        state.waiters.len()
    }
}

impl Clock for MockClock {
    fn now(&self) -> SystemTime {
        self.state.lock().current_time
    }

    fn sleep(&self, duration: Duration) -> SleepFuture {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock();
            let deadline = state.current_time + duration;
            let id = state.id;
            state.id += 1;
            state.waiters.push(WaiterEntry {
                deadline,
                sender: tx,
                id,
            });
            if duration.is_zero() {
                state.satisfy_due_waiters();
            }
        }
        Box::pin(rx.map(|r| {
            if r.is_err() {
                tracing::warn!("Waiting on a mock clock that went away!");
            }
        }))
    }

    fn as_mock(&self) -> Option<&MockClock> {
        Some(self)
    }
}
