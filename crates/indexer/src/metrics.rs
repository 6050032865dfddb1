//! Prometheus metrics for the backfill pipeline and participation queries.

use std::sync::LazyLock;

use beaconwatch_metrics::{
    Histogram, HistogramVec, IntCounterVec, IntGauge, TimingGuard, register_histogram,
    register_histogram_vec, register_int_counter_vec, register_int_gauge,
};

static BACKFILL_SLOTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "beaconwatch_backfill_slots_total",
        "Slots processed by the backfill, by outcome",
        &["outcome"]
    )
    .unwrap()
});

static BACKFILL_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "beaconwatch_backfill_duration_seconds",
        "Duration of complete backfill runs"
    )
    .unwrap()
});

static BACKFILL_LATEST_SLOT: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!(
        "beaconwatch_backfill_latest_slot",
        "Latest finalized slot covered by the stored window"
    )
    .unwrap()
});

static PARTICIPATION_QUERY_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "beaconwatch_participation_query_duration_seconds",
        "Duration of participation rate computations",
        &["mode"]
    )
    .unwrap()
});

pub fn inc_backfill_slot(outcome: &str) {
    BACKFILL_SLOTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn time_backfill() -> TimingGuard {
    TimingGuard::new(BACKFILL_DURATION_SECONDS.clone())
}

pub fn set_backfill_latest_slot(slot: u64) {
    BACKFILL_LATEST_SLOT.set(slot.try_into().unwrap_or(i64::MAX));
}

pub fn time_participation_query(mode: &str) -> TimingGuard {
    TimingGuard::new(PARTICIPATION_QUERY_DURATION_SECONDS.with_label_values(&[mode]))
}
