use std::time::Duration;

use beaconwatch_types::{
    attestation::{Attestation, AttestationsResponse},
    committee::{Committee, CommitteesResponse},
    header::{HeaderData, HeaderResponse},
};
use reqwest::{Client, StatusCode, header::ACCEPT};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::{BeaconApi, BeaconApiError, Endpoint, metrics};

/// Timeout for establishing a connection to the beacon node.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long an idle pooled connection is kept before being closed.
const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for a beacon node.
///
/// Cheap to clone: clones share one connection pool, which is capped at
/// `max_connections` idle connections so that wide fan-outs reuse sockets
/// instead of exhausting them.
#[derive(Debug, Clone)]
pub struct BeaconClient {
    http: Client,
    base_url: String,
}

impl BeaconClient {
    pub fn new(
        base_url: &Url,
        max_connections: usize,
        request_timeout: Duration,
    ) -> Result<Self, BeaconApiError> {
        let http = Client::builder()
            .pool_max_idle_per_host(max_connections)
            .pool_idle_timeout(IDLE_CONNECTION_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// GET `path` and decode the JSON body. A `404` yields `Ok(None)`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        path: &str,
    ) -> Result<Option<T>, BeaconApiError> {
        let url = format!("{}{path}", self.base_url);
        let _timing = metrics::time_request(endpoint);

        let response = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .inspect_err(|err| {
                metrics::inc_request(endpoint, "transport_error");
                warn!(%endpoint, %url, %err, "Beacon API request failed");
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            metrics::inc_request(endpoint, "not_found");
            debug!(%endpoint, %url, "Beacon API returned no data");
            return Ok(None);
        }
        if !status.is_success() {
            metrics::inc_request(endpoint, "bad_status");
            return Err(BeaconApiError::Status { endpoint, status });
        }

        let body = response.bytes().await?;
        let decoded = serde_json::from_slice(&body).inspect_err(|err| {
            metrics::inc_request(endpoint, "decode_error");
            warn!(%endpoint, %url, %err, "Failed to decode beacon API response");
        })?;
        metrics::inc_request(endpoint, "ok");
        Ok(Some(decoded))
    }
}

impl BeaconApi for BeaconClient {
    async fn latest_finalized_slot(&self) -> Result<u64, BeaconApiError> {
        let response: HeaderResponse = self
            .get_json(Endpoint::FinalizedHeader, "/eth/v1/beacon/headers/finalized")
            .await?
            .ok_or(BeaconApiError::NoFinalizedHeader)?;
        Ok(response.data.header.message.slot)
    }

    async fn header(&self, slot: u64) -> Result<Option<HeaderData>, BeaconApiError> {
        let response: Option<HeaderResponse> = self
            .get_json(Endpoint::Header, &format!("/eth/v1/beacon/headers/{slot}"))
            .await?;
        Ok(response.map(|response| response.data))
    }

    async fn committees(&self, epoch: u64) -> Result<Option<Vec<Committee>>, BeaconApiError> {
        let response: Option<CommitteesResponse> = self
            .get_json(
                Endpoint::Committees,
                &format!("/eth/v1/beacon/states/finalized/committees?epoch={epoch}"),
            )
            .await?;
        Ok(response.map(|response| response.data))
    }

    async fn attestations(&self, slot: u64) -> Result<Option<Vec<Attestation>>, BeaconApiError> {
        let response: Option<AttestationsResponse> = self
            .get_json(
                Endpoint::Attestations,
                &format!("/eth/v1/beacon/blocks/{slot}/attestations"),
            )
            .await?;
        Ok(response.map(|response| response.data))
    }
}
