//! Prometheus metrics for beacon API requests.

use std::sync::LazyLock;

use beaconwatch_metrics::{
    HistogramVec, IntCounterVec, TimingGuard, register_histogram_vec, register_int_counter_vec,
};

use crate::Endpoint;

static BEACON_API_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "beaconwatch_beacon_api_requests_total",
        "Beacon API requests by endpoint and outcome",
        &["endpoint", "outcome"]
    )
    .unwrap()
});

static BEACON_API_REQUEST_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "beaconwatch_beacon_api_request_duration_seconds",
        "Duration of beacon API requests",
        &["endpoint"]
    )
    .unwrap()
});

pub fn inc_request(endpoint: Endpoint, outcome: &str) {
    BEACON_API_REQUESTS_TOTAL
        .with_label_values(&[endpoint.as_str(), outcome])
        .inc();
}

/// Start timing a request; the duration is recorded when the guard drops.
pub fn time_request(endpoint: Endpoint) -> TimingGuard {
    TimingGuard::new(
        BEACON_API_REQUEST_DURATION_SECONDS.with_label_values(&[endpoint.as_str()]),
    )
}
