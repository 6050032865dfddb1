use std::{
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use beaconwatch_beacon_client::{BeaconApiError, BeaconClient, RateLimiter};
use beaconwatch_indexer::{
    Backfill, BackfillSettings, BitfieldCollector, CommitteeResolver, ParticipationCalculator,
};
use beaconwatch_rpc::{AppState, start_rpc_server};
use beaconwatch_storage::{StorageBackend, Store, backend::InMemoryBackend};
use beaconwatch_types::config::{
    ChainConfig, ConfigError, DEFAULT_SECONDS_PER_SLOT, DEFAULT_SLOTS_PER_EPOCH, IndexerConfig,
    MAINNET_GENESIS_TIME,
};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, clap::Parser)]
#[command(about = "Backfills finalized beacon headers and serves attestation participation")]
struct CliOptions {
    /// Base URL of the beacon node REST API.
    #[arg(long, env = "BEACON_API_URL", default_value = "http://localhost:5052")]
    beacon_api_url: Url,
    #[arg(long, env = "SLOTS_PER_EPOCH", default_value_t = DEFAULT_SLOTS_PER_EPOCH)]
    slots_per_epoch: u64,
    #[arg(long, env = "SECONDS_PER_SLOT", default_value_t = DEFAULT_SECONDS_PER_SLOT)]
    seconds_per_slot: u64,
    /// Unix time of the genesis slot.
    #[arg(long, env = "GENESIS_TIME", default_value_t = MAINNET_GENESIS_TIME)]
    genesis_time: u64,
    /// Finalized epochs kept by the header backfill.
    #[arg(long, env = "EPOCH_COUNT", default_value_t = 5)]
    epoch_count: u64,
    /// Idle connections kept open to the beacon node.
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 10)]
    max_connections: usize,
    #[arg(long, env = "HEADER_REQUESTS_PER_SECOND", default_value_t = 24)]
    header_requests_per_second: u32,
    #[arg(long, env = "ATTESTATION_REQUESTS_PER_SECOND", default_value_t = 25)]
    attestation_requests_per_second: u32,
    /// Committee requests in flight at once, across all participation queries.
    #[arg(long, env = "MAX_COMMITTEE_FETCHES", default_value_t = 4)]
    max_committee_fetches: usize,
    /// Largest epoch count accepted by `/participation-rate`.
    #[arg(long, env = "MAX_QUERY_EPOCHS", default_value_t = 16)]
    max_query_epochs: u64,
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    request_timeout_secs: u64,
    #[arg(long, env = "BACKFILL_DEADLINE_SECS", default_value_t = 600)]
    backfill_deadline_secs: u64,
    #[arg(long, env = "QUERY_DEADLINE_SECS", default_value_t = 120)]
    query_deadline_secs: u64,
    /// Port of the query API.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    /// Persist headers in RocksDB at this path instead of in memory.
    #[arg(long, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,
}

impl CliOptions {
    fn indexer_config(&self) -> Result<IndexerConfig, ConfigError> {
        let config = IndexerConfig {
            beacon_api_url: self.beacon_api_url.clone(),
            chain: ChainConfig {
                slots_per_epoch: self.slots_per_epoch,
                seconds_per_slot: self.seconds_per_slot,
                genesis_time: self.genesis_time,
            },
            epoch_count: self.epoch_count,
            max_connections: self.max_connections,
            header_requests_per_second: self.header_requests_per_second,
            attestation_requests_per_second: self.attestation_requests_per_second,
            max_committee_fetches: self.max_committee_fetches,
            max_query_epochs: self.max_query_epochs,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            backfill_deadline: Duration::from_secs(self.backfill_deadline_secs),
            query_deadline: Duration::from_secs(self.query_deadline_secs),
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to build beacon API client: {0}")]
    Client(#[from] BeaconApiError),
    #[error("failed to open storage: {0}")]
    Storage(beaconwatch_storage::Error),
    #[error("query API failed: {0}")]
    Server(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let options = CliOptions::parse();
    let config = options.indexer_config().inspect_err(|err| {
        error!(%err, "Invalid configuration");
    })?;
    info!(
        beacon_api_url = %config.beacon_api_url,
        epoch_count = config.epoch_count,
        slots_per_epoch = config.chain.slots_per_epoch,
        "Starting beaconwatch"
    );

    let api = Arc::new(BeaconClient::new(
        &config.beacon_api_url,
        config.max_connections,
        config.request_timeout,
    )?);
    let store = Store::new(open_backend(options.data_dir.as_deref())?);

    let backfill = Backfill::new(
        Arc::clone(&api),
        store.clone(),
        config.chain,
        BackfillSettings {
            epoch_count: config.epoch_count,
            requests_per_second: config.header_requests_per_second,
            deadline: config.backfill_deadline,
        },
    );
    let backfill_task = tokio::spawn(async move {
        match backfill.run().await {
            Ok(report) => info!(
                latest_slot = report.latest_slot,
                stored = report.stored,
                missed = report.missed,
                failed = report.failed,
                "Backfill finished"
            ),
            Err(err) => error!(%err, "Backfill failed"),
        }
    });

    // Shared by every participation query.
    let attestation_limiter = Arc::new(RateLimiter::per_second(
        config.attestation_requests_per_second,
    ));
    let bitfields = BitfieldCollector::new(Arc::clone(&api), attestation_limiter, config.chain);
    let committees = CommitteeResolver::new(Arc::clone(&api), config.max_committee_fetches);
    let calculator = ParticipationCalculator::new(
        api,
        committees,
        bitfields,
        config.chain,
        config.query_deadline,
    );
    let state = AppState {
        store,
        calculator,
        max_query_epochs: config.max_query_epochs,
    };

    let address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, options.port));
    start_rpc_server(address, state, shutdown_signal()).await?;

    backfill_task.abort();
    info!("Shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "Failed to listen for ctrl-c signal");
        std::future::pending::<()>().await;
    }
}

fn open_backend(data_dir: Option<&Path>) -> Result<Arc<dyn StorageBackend>, StartupError> {
    let Some(path) = data_dir else {
        return Ok(Arc::new(InMemoryBackend::new()));
    };
    open_persistent_backend(path)
}

#[cfg(feature = "rocksdb")]
fn open_persistent_backend(path: &Path) -> Result<Arc<dyn StorageBackend>, StartupError> {
    use beaconwatch_storage::backend::RocksDBBackend;

    info!(path = %path.display(), "Opening RocksDB storage");
    let backend = RocksDBBackend::open(path).map_err(StartupError::Storage)?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "rocksdb"))]
fn open_persistent_backend(path: &Path) -> Result<Arc<dyn StorageBackend>, StartupError> {
    Err(StartupError::Storage(
        format!(
            "cannot open {}: built without the `rocksdb` feature",
            path.display()
        )
        .into(),
    ))
}
