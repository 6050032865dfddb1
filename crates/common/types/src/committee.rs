use serde::{Deserialize, Serialize};

use crate::serde_utils::quoted_u64;

/// Response of `GET /eth/v1/beacon/states/{state_id}/committees`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitteesResponse {
    #[serde(default)]
    pub execution_optimistic: bool,
    #[serde(default)]
    pub finalized: bool,
    pub data: Vec<Committee>,
}

/// A committee assignment. A validator's position in `validators` is the
/// position of its bit in the committee's aggregation bitfield.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committee {
    pub index: String,
    #[serde(with = "quoted_u64")]
    pub slot: u64,
    pub validators: Vec<String>,
}

/// Where a validator sits within its epoch's committees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorPosition {
    pub committee_index: String,
    pub slot: u64,
    pub position: usize,
}
