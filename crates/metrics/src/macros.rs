/// Register an integer counter with the rill metrics registry and store it
/// in a static variable.
/// An optional third argument allows specifying labels for this metric.
/// The reported metric name is the lower_snake_case version of the declared
/// variable name.
#[macro_export]
macro_rules! register_rill_counter {
    ($VIS:vis $NAME:ident, $HELP:literal $(,)?) => {
        $VIS static $NAME: std::sync::LazyLock<$crate::prometheus::IntCounter> =
            std::sync::LazyLock::new(|| {
                $crate::paste! {
                    $crate::register_counter_impl(stringify!([<$NAME:lower>]), $HELP)
                }
            });
    };
    ($VIS:vis $NAME:ident, $HELP:literal, $LABELS:expr $(,)?) => {
        $VIS static $NAME: std::sync::LazyLock<$crate::prometheus::IntCounterVec> =
            std::sync::LazyLock::new(|| {
                $crate::paste! {
                    $crate::register_counter_vec_impl(stringify!([<$NAME:lower>]), $HELP, $LABELS)
                }
            });
    };
}

/// Register a histogram with the rill metrics registry and store it in a
/// static variable. Same naming rules as [`register_rill_counter`].
#[macro_export]
macro_rules! register_rill_histogram {
    ($VIS:vis $NAME:ident, $HELP:literal $(,)?) => {
        $VIS static $NAME: std::sync::LazyLock<$crate::prometheus::Histogram> =
            std::sync::LazyLock::new(|| {
                $crate::paste! {
                    $crate::register_histogram_impl(stringify!([<$NAME:lower>]), $HELP)
                }
            });
    };
    ($VIS:vis $NAME:ident, $HELP:literal, $LABELS:expr $(,)?) => {
        $VIS static $NAME: std::sync::LazyLock<$crate::prometheus::HistogramVec> =
            std::sync::LazyLock::new(|| {
                $crate::paste! {
                    $crate::register_histogram_vec_impl(stringify!([<$NAME:lower>]), $HELP, $LABELS)
                }
            });
    };
}

/// Register a gauge with the rill metrics registry and store it in a static
/// variable. Same naming rules as [`register_rill_counter`].
#[macro_export]
macro_rules! register_rill_gauge {
    ($VIS:vis $NAME:ident, $HELP:literal $(,)?) => {
        $VIS static $NAME: std::sync::LazyLock<$crate::prometheus::Gauge> =
            std::sync::LazyLock::new(|| {
                $crate::paste! {
                    $crate::register_gauge_impl(stringify!([<$NAME:lower>]), $HELP)
                }
            });
    };
}
