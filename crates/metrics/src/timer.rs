use std::time::{
    Duration,
    Instant,
};

use prometheus::Histogram;

use crate::log_distribution;

/// Observes the elapsed wall time into a histogram (in seconds) when dropped.
/// Timers that unwind with a panic record nothing.
pub struct Timer {
    start: Instant,
    histogram: &'static Histogram,
}

impl Timer {
    pub fn new(histogram: &'static Histogram) -> Self {
        Self {
            start: Instant::now(),
            histogram,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        log_distribution(self.histogram, self.start.elapsed().as_secs_f64());
    }
}
