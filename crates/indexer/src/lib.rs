pub mod attestations;
pub mod backfill;
pub mod bitfield;
pub mod committees;
mod metrics;
pub mod participation;

#[cfg(test)]
mod test_utils;

pub use attestations::BitfieldCollector;
pub use backfill::{Backfill, BackfillError, BackfillReport, BackfillSettings};
pub use committees::CommitteeResolver;
pub use participation::{ParticipationCalculator, ParticipationError};
