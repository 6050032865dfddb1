//! Collection of an epoch's aggregation bitfields from block attestations.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use beaconwatch_beacon_client::{BeaconApi, RateLimiter};
use beaconwatch_types::{attestation::Attestation, config::ChainConfig};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Committee index → `0x`-prefixed aggregation bitfield.
pub type EpochBitfields = HashMap<String, String>;

/// Concurrent merge of attestation bitfields keyed by committee index.
///
/// Last write wins: a committee index reported by several blocks keeps the
/// bitfield from the highest block slot, and within one block the attestation
/// listed last. The outcome does not depend on the order in which fetch tasks
/// finish.
#[derive(Default)]
pub struct BitfieldMerge {
    entries: Mutex<HashMap<String, (u64, String)>>,
}

impl BitfieldMerge {
    /// Record the attestations included in the block at `block_slot`.
    pub fn record(&self, block_slot: u64, attestations: &[Attestation]) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for attestation in attestations {
            let candidate = (block_slot, attestation.aggregation_bits.clone());
            entries
                .entry(attestation.data.index.clone())
                .and_modify(|existing| {
                    if existing.0 <= block_slot {
                        *existing = candidate.clone();
                    }
                })
                .or_insert(candidate);
        }
    }

    pub fn into_bitfields(self) -> EpochBitfields {
        self.entries
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .map(|(index, (_, bits))| (index, bits))
            .collect()
    }
}

/// Fetches the attestations of an epoch's blocks, one rate-limited task per slot.
pub struct BitfieldCollector<A> {
    api: Arc<A>,
    limiter: Arc<RateLimiter>,
    chain: ChainConfig,
}

impl<A> Clone for BitfieldCollector<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            limiter: Arc::clone(&self.limiter),
            chain: self.chain,
        }
    }
}

impl<A: BeaconApi> BitfieldCollector<A> {
    /// `limiter` is shared by every collection, across concurrent queries.
    pub fn new(api: Arc<A>, limiter: Arc<RateLimiter>, chain: ChainConfig) -> Self {
        Self {
            api,
            limiter,
            chain,
        }
    }

    /// Block slots scanned for `epoch`'s attestations.
    ///
    /// Attestations are included in blocks after the slot they vote in, so the
    /// scan starts one slot into the epoch and ends on the next epoch's first slot.
    pub fn block_slots(&self, epoch: u64) -> std::ops::RangeInclusive<u64> {
        let start = self.chain.epoch_start_slot(epoch);
        start + 1..=start + self.chain.slots_per_epoch
    }

    /// Merged bitfields of `epoch`. Missed slots and failed fetches are
    /// skipped; the result is whatever could be collected.
    pub async fn epoch_bitfields(&self, epoch: u64) -> EpochBitfields {
        debug!(%epoch, "Collecting attestation bitfields");
        let merge = Arc::new(BitfieldMerge::default());
        let mut tasks = JoinSet::new();

        for slot in self.block_slots(epoch) {
            let api = Arc::clone(&self.api);
            let limiter = Arc::clone(&self.limiter);
            let merge = Arc::clone(&merge);
            tasks.spawn(async move {
                limiter.acquire().await;
                match api.attestations(slot).await {
                    Ok(Some(attestations)) => merge.record(slot, &attestations),
                    Ok(None) => debug!(%slot, "Slot was missed, no attestations"),
                    Err(err) => warn!(%slot, %err, "Failed to fetch attestations"),
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                error!(%epoch, %err, "Attestation fetch task failed");
            }
        }

        // Every task has been joined, so this is the last reference.
        Arc::into_inner(merge)
            .map(BitfieldMerge::into_bitfields)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockBeaconApi, attestation};

    fn chain() -> ChainConfig {
        ChainConfig {
            slots_per_epoch: 32,
            seconds_per_slot: 12,
            genesis_time: 0,
        }
    }

    #[test]
    fn later_block_slot_wins() {
        let merge = BitfieldMerge::default();
        merge.record(70, &[attestation("0", 69, "0x80")]);
        merge.record(72, &[attestation("0", 71, "0xc0")]);
        merge.record(71, &[attestation("0", 70, "0xe0")]);
        merge.record(71, &[attestation("1", 70, "0xff")]);

        let bitfields = merge.into_bitfields();
        assert_eq!(bitfields.len(), 2);
        assert_eq!(bitfields["0"], "0xc0");
        assert_eq!(bitfields["1"], "0xff");
    }

    #[test]
    fn later_attestation_in_a_block_wins() {
        let merge = BitfieldMerge::default();
        merge.record(
            70,
            &[attestation("3", 69, "0x01"), attestation("3", 68, "0x02")],
        );
        assert_eq!(merge.into_bitfields()["3"], "0x02");
    }

    #[tokio::test]
    async fn scans_the_slots_after_each_epoch_slot() {
        let collector = BitfieldCollector::new(
            Arc::new(MockBeaconApi::default()),
            Arc::new(RateLimiter::per_second(25)),
            chain(),
        );
        assert_eq!(collector.block_slots(0), 1..=32);
        assert_eq!(collector.block_slots(2), 65..=96);
    }

    #[tokio::test(start_paused = true)]
    async fn collects_from_every_block_of_the_epoch() {
        let mut api = MockBeaconApi::default();
        api.attestations.insert(65, vec![attestation("0", 64, "0x80")]);
        api.attestations.insert(80, vec![attestation("1", 79, "0xf0")]);
        api.attestations.insert(96, vec![attestation("0", 95, "0xc0")]);
        // Outside epoch 2's block range.
        api.attestations.insert(97, vec![attestation("2", 96, "0xff")]);
        let api = Arc::new(api);

        let collector =
            BitfieldCollector::new(Arc::clone(&api), Arc::new(RateLimiter::per_second(25)), chain());
        let bitfields = collector.epoch_bitfields(2).await;

        assert_eq!(bitfields.len(), 2);
        assert_eq!(bitfields["0"], "0xc0");
        assert_eq!(bitfields["1"], "0xf0");

        let mut requested = api.requested_attestations();
        requested.sort();
        assert_eq!(requested, (65..=96).collect::<Vec<_>>());
    }
}
