use std::{future::Future, net::SocketAddr};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use beaconwatch_beacon_client::BeaconApi;
use beaconwatch_indexer::{ParticipationCalculator, ParticipationError};
use beaconwatch_storage::{FilterError, HeaderFilter, Store, StoreError};
use beaconwatch_types::{header::SlotHeader, participation::Participation};
use tracing::{debug, error, info};

pub mod metrics;

/// Raw query parameters, in request order, duplicates preserved.
type QueryParams = Vec<(String, String)>;

const EPOCH_PARAM: &str = "epoch";
const VALIDATOR_PARAM: &str = "validatorIndex";

/// Shared state of the query API.
pub struct AppState<A> {
    pub store: Store,
    pub calculator: ParticipationCalculator<A>,
    /// Largest `epoch` accepted by `/participation-rate`.
    pub max_query_epochs: u64,
}

impl<A> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            calculator: self.calculator.clone(),
            max_query_epochs: self.max_query_epochs,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Participation(#[from] ParticipationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) | ApiError::Filter(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(err) => {
                error!(%err, "Failed to read stored headers");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Participation(err) => {
                error!(%err, "Participation query failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

pub fn build_router<A: BeaconApi>(state: AppState<A>) -> Router {
    Router::new()
        .route("/data", get(get_data::<A>))
        .route("/participation-rate", get(get_participation_rate::<A>))
        .merge(metrics::start_prometheus_metrics_api())
        .with_state(state)
}

/// Serve the query API on `address` until `shutdown` resolves.
pub async fn start_rpc_server<A: BeaconApi>(
    address: SocketAddr,
    state: AppState<A>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(%address, "Query API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn get_data<A: BeaconApi>(
    State(state): State<AppState<A>>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Vec<SlotHeader>>, ApiError> {
    let filter = match params.as_slice() {
        [] => None,
        [(column, value)] => Some(HeaderFilter::parse(column, value)?),
        _ => {
            return Err(ApiError::BadRequest(
                "at most one filter parameter is allowed".to_string(),
            ));
        }
    };
    let headers = state.store.headers(filter.as_ref())?;
    debug!(?filter, count = headers.len(), "Served stored headers");
    Ok(Json(headers))
}

#[derive(Debug, PartialEq, Eq)]
struct ParticipationQuery {
    epoch_count: u64,
    validator_index: Option<String>,
}

impl ParticipationQuery {
    fn parse(params: QueryParams, max_epochs: u64) -> Result<Self, ApiError> {
        if params.len() > 2 {
            return Err(ApiError::BadRequest(format!(
                "expected at most two parameters, got {}",
                params.len()
            )));
        }
        let mut epoch = None;
        let mut validator_index = None;
        for (name, value) in params {
            let slot = match name.as_str() {
                EPOCH_PARAM => &mut epoch,
                VALIDATOR_PARAM => &mut validator_index,
                _ => return Err(ApiError::BadRequest(format!("unknown parameter {name:?}"))),
            };
            if slot.replace(value).is_some() {
                return Err(ApiError::BadRequest(format!("duplicate parameter {name:?}")));
            }
        }

        let epoch =
            epoch.ok_or_else(|| ApiError::BadRequest(format!("missing parameter {EPOCH_PARAM:?}")))?;
        let epoch_count: u64 = epoch
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("epoch must be a number, got {epoch:?}")))?;
        if epoch_count > max_epochs {
            return Err(ApiError::BadRequest(format!(
                "epoch must be at most {max_epochs}, got {epoch_count}"
            )));
        }
        if validator_index.as_deref() == Some("") {
            return Err(ApiError::BadRequest(format!(
                "{VALIDATOR_PARAM:?} must not be empty"
            )));
        }

        Ok(Self {
            epoch_count: epoch_count.max(1),
            validator_index,
        })
    }
}

async fn get_participation_rate<A: BeaconApi>(
    State(state): State<AppState<A>>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Participation>, ApiError> {
    let query = ParticipationQuery::parse(params, state.max_query_epochs)?;
    let participation = state
        .calculator
        .participation(query.epoch_count, query.validator_index)
        .await?;
    Ok(Json(participation))
}
