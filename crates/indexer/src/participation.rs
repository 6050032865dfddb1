//! Attestation participation over the most recent finalized epochs.

use std::{iter::Sum, ops::Add, sync::Arc, time::Duration};

use beaconwatch_beacon_client::{BeaconApi, BeaconApiError};
use beaconwatch_types::{config::ChainConfig, participation::Participation};
use tokio::{task::JoinSet, time};
use tracing::{debug, error, info, warn};

use crate::{
    attestations::BitfieldCollector,
    bitfield::{bit_at, count_set_bits, count_unset_bits},
    committees::CommitteeResolver,
    metrics,
};

#[derive(Debug, thiserror::Error)]
pub enum ParticipationError {
    #[error("failed to fetch latest finalized epoch: {0}")]
    LatestEpoch(#[source] BeaconApiError),
    #[error("participation query did not finish within {0:?}")]
    DeadlineExceeded(Duration),
}

/// Attestation counts of one epoch. Tallies of different epochs are summed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpochTally {
    pub missed: u64,
    pub participated: u64,
    pub undetermined: u64,
    pub committee_seats: u64,
}

impl Add for EpochTally {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            missed: self.missed + other.missed,
            participated: self.participated + other.participated,
            undetermined: self.undetermined + other.undetermined,
            committee_seats: self.committee_seats + other.committee_seats,
        }
    }
}

impl Sum for EpochTally {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Network-wide participation: the share of committee seats that attested.
///
/// Zero when nothing was observed.
pub fn network_factor(tally: &EpochTally, epochs: u64, slots_per_epoch: u64) -> f64 {
    let denominator = epochs as f64 * slots_per_epoch as f64 * tally.committee_seats as f64;
    if denominator == 0.0 {
        return 0.0;
    }
    (1.0 - tally.missed as f64 / denominator).clamp(0.0, 1.0)
}

/// Single-validator factor: missed attestations over the slots in the range.
///
/// A validator attests once per epoch, so this is not on the same scale as
/// [`network_factor`].
pub fn validator_factor(tally: &EpochTally, epochs: u64, slots_per_epoch: u64) -> f64 {
    let denominator = epochs as f64 * slots_per_epoch as f64;
    if denominator == 0.0 {
        return 0.0;
    }
    (tally.missed as f64 / denominator).clamp(0.0, 1.0)
}

/// Computes participation on demand from live committee and attestation data.
pub struct ParticipationCalculator<A> {
    api: Arc<A>,
    committees: CommitteeResolver<A>,
    bitfields: BitfieldCollector<A>,
    chain: ChainConfig,
    deadline: Duration,
}

impl<A> Clone for ParticipationCalculator<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            committees: self.committees.clone(),
            bitfields: self.bitfields.clone(),
            chain: self.chain,
            deadline: self.deadline,
        }
    }
}

impl<A: BeaconApi> ParticipationCalculator<A> {
    /// `committees` and `bitfields` carry the fetch limits shared by every query.
    pub fn new(
        api: Arc<A>,
        committees: CommitteeResolver<A>,
        bitfields: BitfieldCollector<A>,
        chain: ChainConfig,
        deadline: Duration,
    ) -> Self {
        Self {
            api,
            committees,
            bitfields,
            chain,
            deadline,
        }
    }

    /// Epochs covered by a query over the `epoch_count` latest finalized epochs.
    pub fn epoch_range(latest_epoch: u64, epoch_count: u64) -> std::ops::RangeInclusive<u64> {
        (latest_epoch + 1).saturating_sub(epoch_count.max(1))..=latest_epoch
    }

    /// Participation over the last `epoch_count` finalized epochs, for the
    /// whole network or, with `validator_index`, for a single validator.
    pub async fn participation(
        &self,
        epoch_count: u64,
        validator_index: Option<String>,
    ) -> Result<Participation, ParticipationError> {
        let epoch_count = epoch_count.max(1);
        let mode = if validator_index.is_some() {
            "validator"
        } else {
            "network"
        };
        let _timing = metrics::time_participation_query(mode);

        let latest_epoch = self
            .api
            .latest_finalized_epoch(&self.chain)
            .await
            .map_err(ParticipationError::LatestEpoch)?;
        let epochs = Self::epoch_range(latest_epoch, epoch_count);
        // Fewer than requested when the range is cut off at genesis.
        let epochs_covered = epochs.clone().count() as u64;
        info!(
            %mode,
            first_epoch = epochs.start(),
            last_epoch = epochs.end(),
            validator = validator_index.as_deref().unwrap_or("-"),
            "Computing participation"
        );

        let mut tasks = JoinSet::new();
        for epoch in epochs {
            let calculator = self.clone();
            let validator_index = validator_index.clone();
            tasks.spawn(async move {
                match validator_index {
                    Some(validator_index) => {
                        calculator.validator_tally(epoch, &validator_index).await
                    }
                    None => calculator.network_tally(epoch).await,
                }
            });
        }

        let mut tally = EpochTally::default();
        let joined = time::timeout(self.deadline, async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(epoch_tally) => tally = tally + epoch_tally,
                    Err(err) => error!(%err, "Participation task failed"),
                }
            }
        })
        .await;
        if joined.is_err() {
            tasks.abort_all();
            error!(deadline = ?self.deadline, "Participation query deadline exceeded");
            return Err(ParticipationError::DeadlineExceeded(self.deadline));
        }

        let spe = self.chain.slots_per_epoch;
        let participation = match validator_index {
            Some(_) => Participation {
                participation_factor: validator_factor(&tally, epochs_covered, spe),
                missed_attestations: tally.missed,
                actual_attestations: Some(tally.participated),
                undetermined_attestations: Some(tally.undetermined),
                validator_set_size: None,
                epochs: epochs_covered,
            },
            None => Participation {
                participation_factor: network_factor(&tally, epochs_covered, spe),
                missed_attestations: tally.missed,
                actual_attestations: Some(tally.participated),
                undetermined_attestations: None,
                validator_set_size: Some(tally.committee_seats),
                epochs: epochs_covered,
            },
        };
        debug!(?participation, "Participation computed");
        Ok(participation)
    }

    /// Missed and included attestations of every committee seen in `epoch`.
    pub async fn network_tally(&self, epoch: u64) -> EpochTally {
        let (sizes, bitfields) = tokio::join!(
            self.committees.committee_sizes(epoch),
            self.bitfields.epoch_bitfields(epoch)
        );
        let sizes = match sizes {
            Ok(sizes) => sizes,
            Err(err) => {
                warn!(%epoch, %err, "Failed to fetch committees, skipping epoch");
                return EpochTally::default();
            }
        };

        let mut tally = EpochTally::default();
        for (committee_index, bits) in &bitfields {
            let Some(&size) = sizes.get(committee_index) else {
                debug!(%epoch, %committee_index, "No committee for bitfield");
                continue;
            };
            tally.missed += count_unset_bits(bits, size) as u64;
            tally.participated += count_set_bits(bits, size) as u64;
            tally.committee_seats += size as u64;
        }
        debug!(%epoch, ?tally, "Network epoch tallied");
        tally
    }

    /// Whether `validator_index` attested in `epoch`.
    pub async fn validator_tally(&self, epoch: u64, validator_index: &str) -> EpochTally {
        let undetermined = EpochTally {
            undetermined: 1,
            ..Default::default()
        };
        let (position, bitfields) = tokio::join!(
            self.committees.validator_position(epoch, validator_index),
            self.bitfields.epoch_bitfields(epoch)
        );
        let position = match position {
            Ok(Some(position)) => position,
            Ok(None) => {
                debug!(%epoch, %validator_index, "Validator is in no committee");
                return undetermined;
            }
            Err(err) => {
                warn!(%epoch, %err, "Failed to fetch committees, attestation undetermined");
                return undetermined;
            }
        };

        let bit = bitfields
            .get(&position.committee_index)
            .and_then(|bits| bit_at(bits, position.position));
        match bit {
            Some(true) => EpochTally {
                participated: 1,
                ..Default::default()
            },
            Some(false) => EpochTally {
                missed: 1,
                ..Default::default()
            },
            None => {
                debug!(
                    %epoch,
                    committee_index = %position.committee_index,
                    "No readable bitfield for validator's committee"
                );
                undetermined
            }
        }
    }
}
