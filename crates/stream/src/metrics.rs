use metrics::{
    log_counter,
    register_rill_counter,
    register_rill_histogram,
    Timer,
};

register_rill_counter!(
    RILL_STREAM_EVENTS_RECEIVED_TOTAL,
    "Number of write events received, decoded or not"
);
pub fn log_event_received() {
    log_counter(&RILL_STREAM_EVENTS_RECEIVED_TOTAL, 1);
}

register_rill_counter!(
    RILL_STREAM_EVENTS_MALFORMED_TOTAL,
    "Number of write events dropped because their bytes did not decode"
);
pub fn log_event_malformed() {
    log_counter(&RILL_STREAM_EVENTS_MALFORMED_TOTAL, 1);
}

register_rill_counter!(
    RILL_STREAM_EVENTS_REJECTED_TOTAL,
    "Number of write events rejected during batching"
);
pub fn log_event_rejected() {
    log_counter(&RILL_STREAM_EVENTS_REJECTED_TOTAL, 1);
}

register_rill_counter!(
    RILL_STREAM_ROWS_FLUSHED_TOTAL,
    "Number of rows committed to ts-tables"
);
pub fn log_rows_flushed(rows: u64) {
    log_counter(&RILL_STREAM_ROWS_FLUSHED_TOTAL, rows);
}

register_rill_counter!(
    RILL_STREAM_SERIES_DOCS_INSERTED_TOTAL,
    "Number of series documents handed to segment index databases"
);
pub fn log_series_docs_inserted(docs: u64) {
    log_counter(&RILL_STREAM_SERIES_DOCS_INSERTED_TOTAL, docs);
}

register_rill_histogram!(
    RILL_STREAM_FLUSH_SECONDS,
    "Latency of committing one batch's accumulated groups"
);
pub fn flush_timer() -> Timer {
    Timer::new(&RILL_STREAM_FLUSH_SECONDS)
}
