//! Client for the standard beacon node REST API.
//!
//! Only the four read endpoints the indexer needs are covered. A `404` is not
//! an error for slot- and epoch-keyed endpoints: it means the slot was missed
//! (or the epoch has no data) and is surfaced as `Ok(None)`.

use std::future::Future;

use beaconwatch_types::{
    attestation::Attestation, committee::Committee, config::ChainConfig, header::HeaderData,
};

mod client;
pub mod metrics;
mod rate_limit;

pub use client::BeaconClient;
pub use rate_limit::RateLimiter;
pub use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum BeaconApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON decoding failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{endpoint} returned status {status}")]
    Status {
        endpoint: Endpoint,
        status: StatusCode,
    },
    #[error("beacon node has no finalized header")]
    NoFinalizedHeader,
}

/// Endpoints of the beacon API used by the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    FinalizedHeader,
    Header,
    Committees,
    Attestations,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::FinalizedHeader => "finalized_header",
            Endpoint::Header => "header",
            Endpoint::Committees => "committees",
            Endpoint::Attestations => "attestations",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read access to finalized beacon chain data.
///
/// Implemented by [`BeaconClient`] for a live node; tests provide in-memory
/// implementations.
pub trait BeaconApi: Send + Sync + 'static {
    /// Slot of the latest finalized block header.
    fn latest_finalized_slot(&self) -> impl Future<Output = Result<u64, BeaconApiError>> + Send;

    /// Epoch containing the latest finalized slot.
    fn latest_finalized_epoch(
        &self,
        chain: &ChainConfig,
    ) -> impl Future<Output = Result<u64, BeaconApiError>> + Send {
        let chain = *chain;
        async move { Ok(chain.epoch_of(self.latest_finalized_slot().await?)) }
    }

    /// Header of the canonical block at `slot`, or `None` if the slot was missed.
    fn header(
        &self,
        slot: u64,
    ) -> impl Future<Output = Result<Option<HeaderData>, BeaconApiError>> + Send;

    /// Committees of the finalized state for `epoch`, or `None` if unavailable.
    fn committees(
        &self,
        epoch: u64,
    ) -> impl Future<Output = Result<Option<Vec<Committee>>, BeaconApiError>> + Send;

    /// Attestations included in the block at `slot`, or `None` if the slot was missed.
    fn attestations(
        &self,
        slot: u64,
    ) -> impl Future<Output = Result<Option<Vec<Attestation>>, BeaconApiError>> + Send;
}
