use serde::{Deserialize, Serialize};

/// Result of a `/participation-rate` query. Built per request, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participation {
    pub participation_factor: f64,
    pub missed_attestations: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_attestations: Option<u64>,
    /// Number of attestations that could not be classified (validator mode only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undetermined_attestations: Option<u64>,
    /// Total committee seats observed (network mode only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator_set_size: Option<u64>,
    pub epochs: u64,
}
