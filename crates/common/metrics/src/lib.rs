//! Metrics utilities and prometheus re-exports for beaconwatch.

mod gather;
mod timing;

// Re-export prometheus types and macros we use
pub use prometheus::{
    Encoder, Error as PrometheusError, Histogram, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, TextEncoder, gather, register_histogram, register_histogram_vec,
    register_int_counter, register_int_counter_vec, register_int_gauge,
};

pub use gather::{GatherError, gather_default_metrics};
pub use timing::TimingGuard;
