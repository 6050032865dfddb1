//! In-memory beacon API used by the indexer tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use beaconwatch_beacon_client::{BeaconApi, BeaconApiError, Endpoint, StatusCode};
use beaconwatch_types::{
    attestation::{Attestation, AttestationData, Checkpoint},
    committee::Committee,
    header::{HeaderData, HeaderMessage, SignedHeader},
};

#[derive(Default)]
pub struct MockBeaconApi {
    /// `None` makes the finalized head request fail.
    pub finalized_slot: Option<u64>,
    pub headers: HashMap<u64, HeaderData>,
    /// Slots whose header request fails with a server error.
    pub failing_slots: HashSet<u64>,
    pub committees: HashMap<u64, Vec<Committee>>,
    /// Epochs whose committee request fails with a server error.
    pub failing_epochs: HashSet<u64>,
    /// Delay applied to every committee request.
    pub committee_delay: Option<Duration>,
    committees_in_flight: AtomicUsize,
    peak_committees_in_flight: AtomicUsize,
    pub attestations: HashMap<u64, Vec<Attestation>>,
    /// Delay applied to every header request.
    pub header_delay: Option<Duration>,
    pub requested_headers: Mutex<Vec<u64>>,
    pub requested_attestations: Mutex<Vec<u64>>,
}

impl MockBeaconApi {
    pub fn with_finalized_slot(slot: u64) -> Self {
        Self {
            finalized_slot: Some(slot),
            ..Default::default()
        }
    }

    pub fn with_headers(mut self, slots: impl IntoIterator<Item = u64>) -> Self {
        for slot in slots {
            self.headers.insert(slot, header_data(slot));
        }
        self
    }

    pub fn requested_headers(&self) -> Vec<u64> {
        self.requested_headers.lock().unwrap().clone()
    }

    pub fn requested_attestations(&self) -> Vec<u64> {
        self.requested_attestations.lock().unwrap().clone()
    }

    /// Most committee requests that were ever in flight at the same time.
    pub fn peak_committees_in_flight(&self) -> usize {
        self.peak_committees_in_flight.load(Ordering::SeqCst)
    }
}

fn server_error(endpoint: Endpoint) -> BeaconApiError {
    BeaconApiError::Status {
        endpoint,
        status: StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl BeaconApi for MockBeaconApi {
    async fn latest_finalized_slot(&self) -> Result<u64, BeaconApiError> {
        self.finalized_slot
            .ok_or_else(|| server_error(Endpoint::FinalizedHeader))
    }

    async fn header(&self, slot: u64) -> Result<Option<HeaderData>, BeaconApiError> {
        self.requested_headers.lock().unwrap().push(slot);
        if let Some(delay) = self.header_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_slots.contains(&slot) {
            return Err(server_error(Endpoint::Header));
        }
        Ok(self.headers.get(&slot).cloned())
    }

    async fn committees(&self, epoch: u64) -> Result<Option<Vec<Committee>>, BeaconApiError> {
        let in_flight = self.committees_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_committees_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);
        if let Some(delay) = self.committee_delay {
            tokio::time::sleep(delay).await;
        }
        self.committees_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_epochs.contains(&epoch) {
            return Err(server_error(Endpoint::Committees));
        }
        Ok(self.committees.get(&epoch).cloned())
    }

    async fn attestations(&self, slot: u64) -> Result<Option<Vec<Attestation>>, BeaconApiError> {
        self.requested_attestations.lock().unwrap().push(slot);
        Ok(self.attestations.get(&slot).cloned())
    }
}

pub fn header_data(slot: u64) -> HeaderData {
    HeaderData {
        root: format!("0xroot{slot}"),
        canonical: true,
        header: SignedHeader {
            message: HeaderMessage {
                slot,
                proposer_index: (slot % 11).to_string(),
                parent_root: format!("0xroot{}", slot.saturating_sub(1)),
                state_root: format!("0xstate{slot}"),
                body_root: format!("0xbody{slot}"),
            },
            signature: format!("0xsig{slot}"),
        },
    }
}

pub fn committee(index: &str, slot: u64, validators: &[&str]) -> Committee {
    Committee {
        index: index.to_string(),
        slot,
        validators: validators.iter().map(|v| v.to_string()).collect(),
    }
}

pub fn attestation(index: &str, slot: u64, aggregation_bits: &str) -> Attestation {
    Attestation {
        aggregation_bits: aggregation_bits.to_string(),
        data: AttestationData {
            slot,
            index: index.to_string(),
            beacon_block_root: "0xblock".to_string(),
            source: Checkpoint {
                epoch: 0,
                root: "0xsource".to_string(),
            },
            target: Checkpoint {
                epoch: 0,
                root: "0xtarget".to_string(),
            },
        },
        signature: "0xsig".to_string(),
    }
}
