use metrics::{
    log_counter,
    register_rill_counter,
};

register_rill_counter!(
    RILL_ERRORS_REPORTED_TOTAL,
    "Number of errors reported to logs without being propagated"
);
pub fn log_errors_reported_total() {
    log_counter(&RILL_ERRORS_REPORTED_TOTAL, 1);
}
