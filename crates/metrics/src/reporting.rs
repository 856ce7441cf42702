use prometheus::{
    core::Collector,
    Gauge,
    Histogram,
    HistogramVec,
    IntCounter,
    IntCounterVec,
};

pub fn log_counter(counter: &IntCounter, increment: u64) {
    counter.inc_by(increment);
}

pub fn log_counter_with_label_values(counter: &IntCounterVec, increment: u64, labels: &[&str]) {
    match counter.get_metric_with_label_values(labels) {
        Ok(metric) => metric.inc_by(increment),
        Err(e) => log_invalid_metric(get_desc(counter), e),
    }
}

pub fn log_gauge(gauge: &Gauge, value: f64) {
    gauge.set(value);
}

pub fn log_distribution(histogram: &Histogram, value: f64) {
    histogram.observe(value);
}

pub fn log_distribution_with_label_values(histogram: &HistogramVec, value: f64, labels: &[&str]) {
    match histogram.get_metric_with_label_values(labels) {
        Ok(metric) => metric.observe(value),
        Err(e) => log_invalid_metric(get_desc(histogram), e),
    }
}

pub fn get_desc<M: Collector>(metric: &M) -> String {
    let unknown = "unknown".to_string();
    metric
        .desc()
        .first()
        .map(|d| d.fq_name.clone())
        .unwrap_or(unknown)
}

fn log_invalid_metric(desc: String, e: prometheus::Error) {
    tracing::error!("Failed to log metric {desc}: {e}");
}
