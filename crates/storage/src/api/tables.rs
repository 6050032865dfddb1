/// Tables in the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Slot header storage: slot (u64 BE) -> JSON-encoded SlotHeader
    SlotHeaders,
    /// Epoch index: epoch (u64 BE) || slot (u64 BE) -> empty
    ///
    /// Lets `/data?epoch=N` resolve its slots with a prefix scan instead of
    /// decoding every stored header.
    EpochSlots,
}

/// All table variants.
#[cfg(feature = "rocksdb")]
pub const ALL_TABLES: [Table; 2] = [Table::SlotHeaders, Table::EpochSlots];
