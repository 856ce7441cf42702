use prometheus::{
    Gauge,
    Histogram,
    HistogramOpts,
    HistogramVec,
    IntCounter,
    IntCounterVec,
    Opts,
};

use crate::RILL_METRICS_REGISTRY;

pub fn register_counter_impl(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("Metric initialization failed");
    RILL_METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Metric registration failed");
    counter
}

pub fn register_counter_vec_impl(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let counter =
        IntCounterVec::new(Opts::new(name, help), labels).expect("Metric initialization failed");
    RILL_METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Metric registration failed");
    counter
}

pub fn register_gauge_impl(name: &str, help: &str) -> Gauge {
    let gauge = Gauge::new(name, help).expect("Metric initialization failed");
    RILL_METRICS_REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("Metric registration failed");
    gauge
}

pub fn register_histogram_impl(name: &str, help: &str) -> Histogram {
    let histogram =
        Histogram::with_opts(HistogramOpts::new(name, help)).expect("Metric initialization failed");
    RILL_METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("Metric registration failed");
    histogram
}

pub fn register_histogram_vec_impl(name: &str, help: &str, labels: &[&str]) -> HistogramVec {
    let histogram = HistogramVec::new(HistogramOpts::new(name, help), labels)
        .expect("Metric initialization failed");
    RILL_METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("Metric registration failed");
    histogram
}
