use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Mainnet genesis time (Dec 1 2020, 12:00:23 UTC).
pub const MAINNET_GENESIS_TIME: u64 = 1606824023;
pub const DEFAULT_SLOTS_PER_EPOCH: u64 = 32;
pub const DEFAULT_SECONDS_PER_SLOT: u64 = 12;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("beacon API URL must use http or https, got {0:?}")]
    UnsupportedScheme(String),
}

/// Timing parameters of the chain being indexed.
///
/// Every slot/epoch computation in the workspace goes through this struct, so
/// a single `slots_per_epoch` value is used throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub slots_per_epoch: u64,
    pub seconds_per_slot: u64,
    pub genesis_time: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            slots_per_epoch: DEFAULT_SLOTS_PER_EPOCH,
            seconds_per_slot: DEFAULT_SECONDS_PER_SLOT,
            genesis_time: MAINNET_GENESIS_TIME,
        }
    }
}

impl ChainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slots_per_epoch == 0 {
            return Err(ConfigError::Zero("slots per epoch"));
        }
        if self.seconds_per_slot == 0 {
            return Err(ConfigError::Zero("seconds per slot"));
        }
        Ok(())
    }

    pub fn epoch_of(&self, slot: u64) -> u64 {
        slot / self.slots_per_epoch
    }

    pub fn epoch_start_slot(&self, epoch: u64) -> u64 {
        epoch * self.slots_per_epoch
    }

    /// Wall-clock unix time at which `slot` starts.
    pub fn slot_time(&self, slot: u64) -> u64 {
        self.genesis_time + slot * self.seconds_per_slot
    }

    /// First slot of the window covering the `epoch_count` most recent epochs
    /// ending at `latest_slot`. Saturates at slot 0 on young chains.
    pub fn window_start_slot(&self, latest_slot: u64, epoch_count: u64) -> u64 {
        let starting_epoch = (self.epoch_of(latest_slot) + 1).saturating_sub(epoch_count);
        self.epoch_start_slot(starting_epoch)
    }
}

/// Runtime configuration shared by the backfill pipeline and the query path.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub beacon_api_url: Url,
    pub chain: ChainConfig,
    /// Number of epochs kept by the backfill window.
    pub epoch_count: u64,
    /// Idle connections kept per host by the beacon API client.
    pub max_connections: usize,
    pub header_requests_per_second: u32,
    pub attestation_requests_per_second: u32,
    /// Committee requests allowed in flight at once, across all queries.
    pub max_committee_fetches: usize,
    /// Largest epoch count a participation query may ask for.
    pub max_query_epochs: u64,
    pub request_timeout: Duration,
    pub backfill_deadline: Duration,
    pub query_deadline: Duration,
}

impl IndexerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chain.validate()?;
        if !matches!(self.beacon_api_url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(
                self.beacon_api_url.scheme().to_string(),
            ));
        }
        if self.epoch_count == 0 {
            return Err(ConfigError::Zero("epoch count"));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Zero("max connections"));
        }
        if self.header_requests_per_second == 0 {
            return Err(ConfigError::Zero("header request rate"));
        }
        if self.attestation_requests_per_second == 0 {
            return Err(ConfigError::Zero("attestation request rate"));
        }
        if self.max_committee_fetches == 0 {
            return Err(ConfigError::Zero("max committee fetches"));
        }
        if self.max_query_epochs == 0 {
            return Err(ConfigError::Zero("max query epochs"));
        }
        for (name, duration) in [
            ("request timeout", self.request_timeout),
            ("backfill deadline", self.backfill_deadline),
            ("query deadline", self.query_deadline),
        ] {
            if duration.is_zero() {
                return Err(ConfigError::Zero(name));
            }
        }
        Ok(())
    }
}
