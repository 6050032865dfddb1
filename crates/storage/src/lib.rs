mod api;
pub mod backend;
mod filter;
mod store;

pub use api::{Error, StorageBackend};
pub use filter::{FilterError, HeaderColumn, HeaderFilter};
pub use store::{Store, StoreError};
