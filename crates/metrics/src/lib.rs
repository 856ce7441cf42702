//! Code for interacting with our metrics logging.

use std::sync::LazyLock;

use prometheus::Registry;

mod macros;
mod registration;
mod reporting;
mod timer;

pub use paste::paste;
pub use prometheus;

pub use crate::{
    registration::{
        register_counter_impl,
        register_counter_vec_impl,
        register_gauge_impl,
        register_histogram_impl,
        register_histogram_vec_impl,
    },
    reporting::{
        get_desc,
        log_counter,
        log_counter_with_label_values,
        log_distribution,
        log_distribution_with_label_values,
        log_gauge,
    },
    timer::Timer,
};

/// Every metric in the process hangs off this registry so an exporter
/// endpoint can scrape a single place.
pub static RILL_METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);
