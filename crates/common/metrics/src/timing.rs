//! Timing utilities for histogram metrics.

use std::time::Instant;

use crate::Histogram;

/// A guard that records elapsed time to a histogram when dropped.
///
/// Works with both plain histograms and labelled children of a
/// [`crate::HistogramVec`], since the latter are owned `Histogram` handles.
pub struct TimingGuard {
    histogram: Histogram,
    start: Instant,
}

impl TimingGuard {
    pub fn new(histogram: Histogram) -> Self {
        Self {
            histogram,
            start: Instant::now(),
        }
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
