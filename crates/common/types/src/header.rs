use serde::{Deserialize, Serialize};

use crate::{config::ChainConfig, serde_utils::quoted_u64};

/// Response of `GET /eth/v1/beacon/headers/{block_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderResponse {
    #[serde(default)]
    pub execution_optimistic: bool,
    #[serde(default)]
    pub finalized: bool,
    pub data: HeaderData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderData {
    pub root: String,
    #[serde(default)]
    pub canonical: bool,
    pub header: SignedHeader,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedHeader {
    pub message: HeaderMessage,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderMessage {
    #[serde(with = "quoted_u64")]
    pub slot: u64,
    pub proposer_index: String,
    pub parent_root: String,
    pub state_root: String,
    pub body_root: String,
}

/// A canonical slot header as persisted by the backfill and served by `/data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotHeader {
    pub slot: u64,
    pub epoch: u64,
    pub unix_time: u64,
    pub root: String,
    pub canonical: bool,
    pub proposer_index: String,
    pub parent_root: String,
    pub state_root: String,
    pub body_root: String,
    pub signature: String,
}

impl SlotHeader {
    /// Flatten an API header, deriving epoch and wall-clock time from the chain config.
    pub fn from_api(data: HeaderData, chain: &ChainConfig) -> Self {
        let HeaderData {
            root,
            canonical,
            header: SignedHeader { message, signature },
        } = data;
        Self {
            slot: message.slot,
            epoch: chain.epoch_of(message.slot),
            unix_time: chain.slot_time(message.slot),
            root,
            canonical,
            proposer_index: message.proposer_index,
            parent_root: message.parent_root,
            state_root: message.state_root,
            body_root: message.body_root,
            signature,
        }
    }
}
