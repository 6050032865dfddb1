use std::sync::Arc;

use beaconwatch_types::header::SlotHeader;
use tracing::debug;

use crate::{
    api::{Error, StorageBackend, Table},
    filter::HeaderFilter,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[from] Error),
    #[error("failed to encode or decode slot header: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("epoch index points at missing slot {0}")]
    DanglingIndex(u64),
}

// ============ Key Encoding Helpers ============

/// Slot key: 8 bytes big-endian, so byte order matches slot order.
fn encode_slot_key(slot: u64) -> Vec<u8> {
    slot.to_be_bytes().to_vec()
}

/// Epoch index key. Layout: epoch (8 bytes BE) || slot (8 bytes BE)
fn encode_epoch_slot_key(epoch: u64, slot: u64) -> Vec<u8> {
    let mut key = epoch.to_be_bytes().to_vec();
    key.extend_from_slice(&slot.to_be_bytes());
    key
}

/// Extract the slot from an epoch index key. Returns `None` for malformed keys.
fn decode_epoch_slot_key(key: &[u8]) -> Option<u64> {
    let slot_bytes: [u8; 8] = key.get(8..16)?.try_into().ok()?;
    Some(u64::from_be_bytes(slot_bytes))
}

/// Persistent view of the backfilled header window, backed by a pluggable
/// storage backend.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn StorageBackend>,
}

impl Store {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Remove every stored header and its index entries in one batch.
    ///
    /// Returns the number of headers removed.
    pub fn clear_headers(&self) -> Result<usize, StoreError> {
        let (header_keys, index_keys) = {
            let view = self.backend.begin_read()?;
            let header_keys = view
                .prefix_iterator(Table::SlotHeaders, &[])?
                .map(|entry| entry.map(|(key, _)| key.into_vec()))
                .collect::<Result<Vec<_>, _>>()?;
            let index_keys = view
                .prefix_iterator(Table::EpochSlots, &[])?
                .map(|entry| entry.map(|(key, _)| key.into_vec()))
                .collect::<Result<Vec<_>, _>>()?;
            (header_keys, index_keys)
        };
        let removed = header_keys.len();

        let mut batch = self.backend.begin_write()?;
        batch.delete_batch(Table::SlotHeaders, header_keys)?;
        batch.delete_batch(Table::EpochSlots, index_keys)?;
        batch.commit()?;

        debug!(removed, "Cleared stored slot headers");
        Ok(removed)
    }

    /// Store a header and index it under its epoch. Overwrites any header
    /// already stored for the same slot.
    pub fn insert_header(&self, header: &SlotHeader) -> Result<(), StoreError> {
        let value = serde_json::to_vec(header)?;
        let mut batch = self.backend.begin_write()?;
        batch.put_batch(
            Table::SlotHeaders,
            vec![(encode_slot_key(header.slot), value)],
        )?;
        batch.put_batch(
            Table::EpochSlots,
            vec![(encode_epoch_slot_key(header.epoch, header.slot), Vec::new())],
        )?;
        batch.commit()?;
        Ok(())
    }

    pub fn get_header(&self, slot: u64) -> Result<Option<SlotHeader>, StoreError> {
        let view = self.backend.begin_read()?;
        view.get(Table::SlotHeaders, &encode_slot_key(slot))?
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .map_err(StoreError::from)
    }

    /// Headers matching `filter` (all headers when `None`), ordered by slot descending.
    pub fn headers(&self, filter: Option<&HeaderFilter>) -> Result<Vec<SlotHeader>, StoreError> {
        let mut headers = match filter {
            Some(HeaderFilter::Slot(slot)) => self.get_header(*slot)?.into_iter().collect(),
            Some(HeaderFilter::Epoch(epoch)) => self.headers_in_epoch(*epoch)?,
            Some(filter) => self
                .all_headers()?
                .into_iter()
                .filter(|header| filter.matches(header))
                .collect(),
            None => self.all_headers()?,
        };
        headers.sort_unstable_by(|a, b| b.slot.cmp(&a.slot));
        Ok(headers)
    }

    pub fn header_count(&self) -> Result<usize, StoreError> {
        let view = self.backend.begin_read()?;
        let mut count = 0;
        for entry in view.prefix_iterator(Table::SlotHeaders, &[])? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    fn all_headers(&self) -> Result<Vec<SlotHeader>, StoreError> {
        let view = self.backend.begin_read()?;
        let mut headers = Vec::new();
        for entry in view.prefix_iterator(Table::SlotHeaders, &[])? {
            let (_, value) = entry?;
            headers.push(serde_json::from_slice(&value)?);
        }
        Ok(headers)
    }

    fn headers_in_epoch(&self, epoch: u64) -> Result<Vec<SlotHeader>, StoreError> {
        let view = self.backend.begin_read()?;
        let mut headers = Vec::new();
        for entry in view.prefix_iterator(Table::EpochSlots, &epoch.to_be_bytes())? {
            let (key, _) = entry?;
            let Some(slot) = decode_epoch_slot_key(&key) else {
                continue;
            };
            let value = view
                .get(Table::SlotHeaders, &encode_slot_key(slot))?
                .ok_or(StoreError::DanglingIndex(slot))?;
            headers.push(serde_json::from_slice(&value)?);
        }
        Ok(headers)
    }
}
