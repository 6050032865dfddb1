//! Backfill of the recent finalized header window into storage.

use std::{sync::Arc, time::Duration};

use beaconwatch_beacon_client::{BeaconApi, BeaconApiError, RateLimiter};
use beaconwatch_storage::{Store, StoreError};
use beaconwatch_types::{ShortRoot, config::ChainConfig, header::SlotHeader};
use tokio::{task::JoinSet, time};
use tracing::{debug, error, info, warn};

use crate::metrics;

#[derive(Debug, thiserror::Error)]
pub enum BackfillError {
    #[error("failed to clear stored headers: {0}")]
    Clear(#[source] StoreError),
    #[error("failed to fetch latest finalized slot: {0}")]
    LatestSlot(#[source] BeaconApiError),
    #[error("backfill did not finish within {0:?}")]
    DeadlineExceeded(Duration),
}

/// Summary of a completed backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub latest_slot: u64,
    pub first_slot: u64,
    pub stored: u64,
    pub missed: u64,
    pub failed: u64,
}

impl BackfillReport {
    pub fn target_slots(&self) -> u64 {
        self.latest_slot - self.first_slot + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotOutcome {
    Stored,
    Missed,
    Failed,
}

impl SlotOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SlotOutcome::Stored => "stored",
            SlotOutcome::Missed => "missed",
            SlotOutcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackfillSettings {
    pub epoch_count: u64,
    pub requests_per_second: u32,
    pub deadline: Duration,
}

/// Replaces the stored header window with the `epoch_count` most recent
/// finalized epochs.
pub struct Backfill<A> {
    api: Arc<A>,
    store: Store,
    chain: ChainConfig,
    settings: BackfillSettings,
}

impl<A: BeaconApi> Backfill<A> {
    pub fn new(api: Arc<A>, store: Store, chain: ChainConfig, settings: BackfillSettings) -> Self {
        Self {
            api,
            store,
            chain,
            settings,
        }
    }

    /// Run one full backfill.
    ///
    /// Only clearing the store and fetching the finalized head are fatal.
    /// Missed slots, failed fetches and failed writes are logged and skipped.
    pub async fn run(&self) -> Result<BackfillReport, BackfillError> {
        let _timing = metrics::time_backfill();

        let removed = self.store.clear_headers().map_err(BackfillError::Clear)?;
        debug!(removed, "Cleared previous header window");

        let latest_slot = self
            .api
            .latest_finalized_slot()
            .await
            .map_err(BackfillError::LatestSlot)?;
        let first_slot = self
            .chain
            .window_start_slot(latest_slot, self.settings.epoch_count);
        info!(
            %latest_slot,
            %first_slot,
            epochs = self.settings.epoch_count,
            "Starting header backfill"
        );

        let limiter = Arc::new(RateLimiter::per_second(self.settings.requests_per_second));
        let mut tasks = JoinSet::new();
        for slot in (first_slot..=latest_slot).rev() {
            let api = Arc::clone(&self.api);
            let limiter = Arc::clone(&limiter);
            let store = self.store.clone();
            let chain = self.chain;
            tasks.spawn(async move {
                limiter.acquire().await;
                backfill_slot(api.as_ref(), &store, &chain, slot).await
            });
        }

        let mut report = BackfillReport {
            latest_slot,
            first_slot,
            ..Default::default()
        };
        let joined = time::timeout(self.settings.deadline, async {
            while let Some(joined) = tasks.join_next().await {
                let outcome = joined.unwrap_or_else(|err| {
                    error!(%err, "Backfill task failed");
                    SlotOutcome::Failed
                });
                metrics::inc_backfill_slot(outcome.as_str());
                match outcome {
                    SlotOutcome::Stored => report.stored += 1,
                    SlotOutcome::Missed => report.missed += 1,
                    SlotOutcome::Failed => report.failed += 1,
                }
            }
        })
        .await;

        if joined.is_err() {
            error!(
                deadline = ?self.settings.deadline,
                stored = report.stored,
                "Backfill deadline exceeded, aborting in-flight fetches"
            );
            // Aborted tasks must be gone before the clear, or a late insert
            // would survive it.
            tasks.shutdown().await;
            match self.store.clear_headers() {
                Ok(removed) => debug!(removed, "Discarded partial header window"),
                Err(err) => error!(%err, "Failed to discard partial header window"),
            }
            return Err(BackfillError::DeadlineExceeded(self.settings.deadline));
        }

        metrics::set_backfill_latest_slot(latest_slot);
        info!(
            stored = report.stored,
            missed = report.missed,
            failed = report.failed,
            "Header backfill completed"
        );
        Ok(report)
    }
}

async fn backfill_slot<A: BeaconApi>(
    api: &A,
    store: &Store,
    chain: &ChainConfig,
    slot: u64,
) -> SlotOutcome {
    let data = match api.header(slot).await {
        Ok(Some(data)) => data,
        Ok(None) => {
            debug!(%slot, "Slot was missed");
            return SlotOutcome::Missed;
        }
        Err(err) => {
            warn!(%slot, %err, "Failed to fetch slot header");
            return SlotOutcome::Failed;
        }
    };

    let header = SlotHeader::from_api(data, chain);
    if let Err(err) = store.insert_header(&header) {
        warn!(%slot, %err, "Failed to store slot header");
        return SlotOutcome::Failed;
    }
    debug!(%slot, root = %ShortRoot(&header.root), "Stored slot header");
    SlotOutcome::Stored
}

#[cfg(test)]
mod tests {
    use beaconwatch_storage::{HeaderFilter, backend::InMemoryBackend};

    use super::*;
    use crate::test_utils::{MockBeaconApi, header_data};

    fn chain() -> ChainConfig {
        ChainConfig {
            slots_per_epoch: 32,
            seconds_per_slot: 12,
            genesis_time: 1000,
        }
    }

    fn settings(epoch_count: u64) -> BackfillSettings {
        BackfillSettings {
            epoch_count,
            requests_per_second: 24,
            deadline: Duration::from_secs(60),
        }
    }

    fn store() -> Store {
        Store::new(Arc::new(InMemoryBackend::new()))
    }

    fn stored_slots(store: &Store) -> Vec<u64> {
        store
            .headers(None)
            .unwrap()
            .iter()
            .map(|header| header.slot)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn fills_the_latest_epoch_window() {
        let api = Arc::new(MockBeaconApi::with_finalized_slot(127).with_headers(0..=127));
        let store = store();
        let backfill = Backfill::new(Arc::clone(&api), store.clone(), chain(), settings(1));

        let report = backfill.run().await.unwrap();

        assert_eq!(report.first_slot, 96);
        assert_eq!(report.target_slots(), 32);
        assert_eq!(report.stored, 32);
        assert_eq!(stored_slots(&store), (96..=127).rev().collect::<Vec<_>>());

        let mut requested = api.requested_headers();
        requested.sort();
        assert_eq!(requested, (96..=127).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn window_starts_at_the_epoch_boundary() {
        let api = Arc::new(MockBeaconApi::with_finalized_slot(100).with_headers(0..=100));
        let store = store();
        let backfill = Backfill::new(Arc::clone(&api), store.clone(), chain(), settings(1));

        let report = backfill.run().await.unwrap();

        assert_eq!((report.first_slot, report.latest_slot), (96, 100));
        assert_eq!(stored_slots(&store), vec![100, 99, 98, 97, 96]);
    }

    #[tokio::test(start_paused = true)]
    async fn missed_and_failed_slots_are_skipped() {
        let mut api = MockBeaconApi::with_finalized_slot(100).with_headers(0..=100);
        api.headers.remove(&98);
        api.failing_slots.insert(99);
        let store = store();
        let backfill = Backfill::new(Arc::new(api), store.clone(), chain(), settings(1));

        let report = backfill.run().await.unwrap();

        assert_eq!(report.stored, 3);
        assert_eq!(report.missed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(stored_slots(&store), vec![100, 97, 96]);
    }

    #[tokio::test(start_paused = true)]
    async fn stores_epoch_and_wall_clock_time() {
        let api = Arc::new(MockBeaconApi::with_finalized_slot(100).with_headers([100]));
        let store = store();
        Backfill::new(api, store.clone(), chain(), settings(1))
            .run()
            .await
            .unwrap();

        let header = store.get_header(100).unwrap().unwrap();
        assert_eq!(header.epoch, 3);
        assert_eq!(header.unix_time, 1000 + 100 * 12);
        assert_eq!(header, SlotHeader::from_api(header_data(100), &chain()));
    }

    #[tokio::test(start_paused = true)]
    async fn replaces_the_previous_window() {
        let store = store();
        let stale = SlotHeader::from_api(header_data(5), &chain());
        store.insert_header(&stale).unwrap();

        let api = Arc::new(MockBeaconApi::with_finalized_slot(70).with_headers(0..=70));
        Backfill::new(api, store.clone(), chain(), settings(1))
            .run()
            .await
            .unwrap();

        assert_eq!(store.get_header(5).unwrap(), None);
        assert!(store.headers(Some(&HeaderFilter::Epoch(0))).unwrap().is_empty());
        assert_eq!(stored_slots(&store), (64..=70).rev().collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_runs_are_idempotent() {
        let api = Arc::new(MockBeaconApi::with_finalized_slot(130).with_headers(0..=130));
        let store = store();
        let backfill = Backfill::new(api, store.clone(), chain(), settings(2));

        backfill.run().await.unwrap();
        let first = store.headers(None).unwrap();
        backfill.run().await.unwrap();
        let second = store.headers(None).unwrap();

        assert_eq!(first.len(), 35);
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn finalized_head_failure_aborts_the_run() {
        let api = Arc::new(MockBeaconApi::default().with_headers(0..=10));
        let store = store();
        store
            .insert_header(&SlotHeader::from_api(header_data(3), &chain()))
            .unwrap();
        let backfill = Backfill::new(Arc::clone(&api), store.clone(), chain(), settings(1));

        let err = backfill.run().await.unwrap_err();

        assert!(matches!(err, BackfillError::LatestSlot(_)), "{err}");
        assert!(api.requested_headers().is_empty());
        // The stale window is gone even though the run failed.
        assert_eq!(store.header_count().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_aborts_in_flight_fetches() {
        let mut api = MockBeaconApi::with_finalized_slot(100).with_headers(0..=100);
        api.header_delay = Some(Duration::from_secs(30));
        let store = store();
        let backfill = Backfill::new(
            Arc::new(api),
            store.clone(),
            chain(),
            BackfillSettings {
                deadline: Duration::from_secs(5),
                ..settings(1)
            },
        );

        let err = backfill.run().await.unwrap_err();
        assert!(matches!(err, BackfillError::DeadlineExceeded(_)), "{err}");
        assert_eq!(store.header_count().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_discards_the_partial_window() {
        // 32 slots at 24/s need about 1.3 s; the run stops after some were stored.
        let api = Arc::new(MockBeaconApi::with_finalized_slot(127).with_headers(0..=127));
        let store = store();
        let backfill = Backfill::new(
            Arc::clone(&api),
            store.clone(),
            chain(),
            BackfillSettings {
                deadline: Duration::from_millis(500),
                ..settings(1)
            },
        );

        let err = backfill.run().await.unwrap_err();

        assert!(matches!(err, BackfillError::DeadlineExceeded(_)), "{err}");
        assert!(!api.requested_headers().is_empty());
        assert!(api.requested_headers().len() < 32);
        assert_eq!(store.header_count().unwrap(), 0);
        assert!(store.headers(None).unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn header_requests_are_rate_limited() {
        let api = Arc::new(MockBeaconApi::with_finalized_slot(127).with_headers(0..=127));
        let backfill = Backfill::new(api, store(), chain(), settings(1));

        let start = time::Instant::now();
        backfill.run().await.unwrap();

        // 32 permits at 24/s: the first is immediate, the rest 1/24 s apart.
        assert!(start.elapsed() >= Duration::from_millis(31 * 1000 / 24));
    }
}
