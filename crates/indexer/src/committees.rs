use std::{collections::HashMap, sync::Arc};

use beaconwatch_beacon_client::{BeaconApi, BeaconApiError};
use beaconwatch_types::committee::{Committee, ValidatorPosition};
use tokio::sync::Semaphore;
use tracing::debug;

/// Live committee lookups. Every call re-fetches the epoch's committees; no
/// caching.
///
/// Clones share one pool of fetch permits, so at most `max_in_flight`
/// committee requests run at once however many queries are active.
pub struct CommitteeResolver<A> {
    api: Arc<A>,
    permits: Arc<Semaphore>,
}

impl<A> Clone for CommitteeResolver<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            permits: Arc::clone(&self.permits),
        }
    }
}

impl<A: BeaconApi> CommitteeResolver<A> {
    pub fn new(api: Arc<A>, max_in_flight: usize) -> Self {
        Self {
            api,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Committee index → member count for `epoch`.
    pub async fn committee_sizes(
        &self,
        epoch: u64,
    ) -> Result<HashMap<String, usize>, BeaconApiError> {
        let committees = self.fetch(epoch).await?;
        Ok(committee_sizes(&committees))
    }

    /// The committee and bit position of `validator_index` in `epoch`, or
    /// `None` if it is in no committee.
    pub async fn validator_position(
        &self,
        epoch: u64,
        validator_index: &str,
    ) -> Result<Option<ValidatorPosition>, BeaconApiError> {
        let committees = self.fetch(epoch).await?;
        Ok(find_validator(&committees, validator_index))
    }

    async fn fetch(&self, epoch: u64) -> Result<Vec<Committee>, BeaconApiError> {
        // The semaphore is never closed.
        let _permit = self.permits.acquire().await.ok();
        debug!(%epoch, "Fetching committees");
        let committees = self.api.committees(epoch).await?.unwrap_or_else(|| {
            debug!(%epoch, "No committees available for epoch");
            Vec::new()
        });
        Ok(committees)
    }
}

/// Committee sizes keyed by committee index.
///
/// Committee indices restart at every slot, so when an epoch contains several
/// committees with the same index the one listed last wins.
pub fn committee_sizes(committees: &[Committee]) -> HashMap<String, usize> {
    committees
        .iter()
        .map(|committee| (committee.index.clone(), committee.validators.len()))
        .collect()
}

pub fn find_validator(committees: &[Committee], validator_index: &str) -> Option<ValidatorPosition> {
    committees.iter().find_map(|committee| {
        let position = committee
            .validators
            .iter()
            .position(|validator| validator == validator_index)?;
        Some(ValidatorPosition {
            committee_index: committee.index.clone(),
            slot: committee.slot,
            position,
        })
    })
}
