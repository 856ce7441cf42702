use crate::metrics::log_errors_reported_total;

/// Log an error chain that is being swallowed rather than propagated
/// (best-effort index writes, background actions). Counted so a spike is
/// visible on a dashboard even when nobody is reading logs.
pub fn report_error(e: &mut anyhow::Error) {
    log_errors_reported_total();
    tracing::error!("Caught error (RUST_BACKTRACE=1 for full trace): {e:#}");
}
