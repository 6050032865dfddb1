use serde::{Deserialize, Serialize};

use crate::serde_utils::quoted_u64;

/// Response of `GET /eth/v1/beacon/blocks/{block_id}/attestations`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttestationsResponse {
    #[serde(default)]
    pub execution_optimistic: bool,
    #[serde(default)]
    pub finalized: bool,
    pub data: Vec<Attestation>,
}

/// Aggregated attestation included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// `0x`-prefixed hex bitfield, one bit per committee member.
    pub aggregation_bits: String,
    pub data: AttestationData,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationData {
    #[serde(with = "quoted_u64")]
    pub slot: u64,
    pub index: String,
    pub beacon_block_root: String,
    pub source: Checkpoint,
    pub target: Checkpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(with = "quoted_u64")]
    pub epoch: u64,
    pub root: String,
}
