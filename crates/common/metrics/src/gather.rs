//! Encoding of the default registry for the `/metrics` endpoint.

use thiserror::Error;

use crate::{Encoder, PrometheusError, TextEncoder, gather};

#[derive(Debug, Error)]
pub enum GatherError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] PrometheusError),
    #[error("UTF-8 conversion error: {0}")]
    FromUtf8(#[from] std::string::FromUtf8Error),
}

/// Returns all metrics registered in Prometheus' default registry, text-encoded.
///
/// The beacon client, backfill and participation metrics all register with the
/// default registry through the `register_*!` macros.
pub fn gather_default_metrics() -> Result<String, GatherError> {
    let encoder = TextEncoder::new();
    let metric_families = gather();

    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register_int_counter;

    #[test]
    fn includes_registered_counters() {
        let counter =
            register_int_counter!("beaconwatch_gather_test_total", "Gather test counter").unwrap();
        counter.inc();
        let text = gather_default_metrics().unwrap();
        assert!(text.contains("beaconwatch_gather_test_total 1"));
    }
}
