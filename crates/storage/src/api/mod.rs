//! Backend-agnostic storage interface.
//!
//! A [`StorageBackend`] hands out read views and write batches over a fixed
//! set of [`Table`]s. Keys and values are opaque bytes; the typed layer lives
//! in [`crate::Store`].

mod tables;
mod traits;

#[cfg(feature = "rocksdb")]
pub use tables::ALL_TABLES;
pub use tables::Table;
pub use traits::{Error, PrefixResult, StorageBackend, StorageReadView, StorageWriteBatch};
