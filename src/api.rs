//! ==============================================================================
//! api.rs - json http surface
//! ==============================================================================
//!
//! purpose:
//!     maps the long-standing readings endpoints onto `ReadingService`. no
//!     decisions are made here: handlers parse, hand off to the service on
//!     the blocking pool (sqlite i/o), and translate errors to status codes.
//!
//! routes:
//!     GET  /devices/                          distinct device ids
//!     GET  /devices/:id/readings/             readings of one device
//!     POST /devices/:id/readings/             {type, value, date_created?}
//!     GET  /devices/:id/readings/max/         [reading with max value]
//!     GET  /devices/:id/readings/median/      [high-median readings]
//!     GET  /devices/:id/readings/mean/        {value}
//!     GET  /devices/:id/readings/quartiles/   {quartile_1, quartile_3}
//!     POST /custom/search/:option             option = type | range
//!     POST /custom/search/                    form search (dd/mm/YYYY days)
//!     GET  /summary/                          per-device summaries
//!
//! ==============================================================================

use axum::{
    body::Bytes,
    extract::{rejection::FormRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::domain::{DeviceSummary, Quartiles, Reading};
use crate::error::{ErrorKind, ReadingError};
use crate::filter::{DaySearchForm, SearchRequest, Selection};
use crate::service::ReadingService;
use crate::validator::RawValue;

// ==============================================================================
// router
// ==============================================================================

pub fn router(service: ReadingService) -> Router {
    Router::new()
        .route("/devices/", get(list_devices))
        .route(
            "/devices/:device_uuid/readings/",
            get(device_readings).post(create_reading),
        )
        .route("/devices/:device_uuid/readings/max/", get(device_max))
        .route("/devices/:device_uuid/readings/median/", get(device_median))
        .route("/devices/:device_uuid/readings/mean/", get(device_mean))
        .route("/devices/:device_uuid/readings/quartiles/", get(device_quartiles))
        .route("/custom/search/", post(search_form))
        .route("/custom/search/:option", post(search))
        .route("/summary/", get(summary))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// bind and serve until ctrl-c
pub async fn serve(bind: &str, service: ReadingService) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "readings api listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
            }
        })
        .await?;
    Ok(())
}

// ==============================================================================
// errors
// ==============================================================================

#[derive(Debug)]
pub enum ApiError {
    Reading(ReadingError),
    MalformedBody(String),
    Worker(String),
}

impl From<ReadingError> for ApiError {
    fn from(e: ReadingError) -> Self {
        ApiError::Reading(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Reading(e) => {
                let kind = e.kind();
                let status = match kind {
                    ErrorKind::EmptySet => StatusCode::NOT_FOUND,
                    ErrorKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
                    _ => StatusCode::BAD_REQUEST,
                };
                if status.is_server_error() {
                    tracing::error!(error = %e, "request failed");
                }
                (status, kind.code()).into_response()
            }
            ApiError::MalformedBody(reason) => {
                tracing::warn!(%reason, "malformed request body");
                (StatusCode::BAD_REQUEST, "MALFORMED_BODY").into_response()
            }
            ApiError::Worker(reason) => {
                tracing::error!(%reason, "blocking task failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR").into_response()
            }
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// run a service call on the blocking pool
async fn blocking<T, F>(service: ReadingService, f: F) -> ApiResult<T>
where
    F: FnOnce(&ReadingService) -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&service))
        .await
        .map_err(|e| ApiError::Worker(e.to_string()))?
        .map_err(ApiError::from)
}

/// bodies are json whatever the content type says; empty means `{}`
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::MalformedBody(e.to_string()))
}

// ==============================================================================
// handlers
// ==============================================================================

#[derive(Debug, Default, Deserialize)]
struct CreateReading {
    #[serde(rename = "type")]
    reading_type: Option<String>,
    value: Option<RawValue>,
    date_created: Option<RawValue>,
}

#[derive(Serialize)]
struct DeviceEntry {
    device_uuid: String,
}

#[derive(Serialize)]
struct MeanValue {
    value: f64,
}

async fn create_reading(
    State(service): State<ReadingService>,
    Path(device_uuid): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, &'static str)> {
    let req: CreateReading = parse_body(&body)?;
    let value = req.value.unwrap_or(RawValue::Other(serde_json::Value::Null));
    let reading_type = req.reading_type.unwrap_or_default();
    blocking(service, move |svc| {
        svc.record(&device_uuid, &reading_type, &value, req.date_created.as_ref())
    })
    .await?;
    Ok((StatusCode::CREATED, "success"))
}

async fn device_readings(
    State(service): State<ReadingService>,
    Path(device_uuid): Path<String>,
) -> ApiResult<Json<Vec<Reading>>> {
    let selection = Selection::ByDevice(device_uuid);
    let readings = blocking(service, move |svc| svc.readings(&selection)).await?;
    Ok(Json(readings))
}

async fn device_max(
    State(service): State<ReadingService>,
    Path(device_uuid): Path<String>,
) -> ApiResult<Json<Vec<Reading>>> {
    let top = blocking(service, move |svc| svc.max_reading(&device_uuid)).await?;
    Ok(Json(vec![top]))
}

async fn device_median(
    State(service): State<ReadingService>,
    Path(device_uuid): Path<String>,
) -> ApiResult<Json<Vec<Reading>>> {
    let median = blocking(service, move |svc| svc.median_records(&device_uuid)).await?;
    Ok(Json(median))
}

async fn device_mean(
    State(service): State<ReadingService>,
    Path(device_uuid): Path<String>,
) -> ApiResult<Json<MeanValue>> {
    let value = blocking(service, move |svc| svc.mean(&device_uuid)).await?;
    Ok(Json(MeanValue { value }))
}

async fn device_quartiles(
    State(service): State<ReadingService>,
    Path(device_uuid): Path<String>,
) -> ApiResult<Json<Quartiles>> {
    let quartiles = blocking(service, move |svc| svc.quartiles(&device_uuid)).await?;
    Ok(Json(quartiles))
}

async fn search(
    State(service): State<ReadingService>,
    Path(option): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Vec<Reading>>> {
    let req: SearchRequest = parse_body(&body)?;
    let selection = req.into_selection(&option)?;
    let readings = blocking(service, move |svc| svc.readings(&selection)).await?;
    Ok(Json(readings))
}

async fn search_form(
    State(service): State<ReadingService>,
    form: Result<Form<DaySearchForm>, FormRejection>,
) -> ApiResult<Json<Vec<Reading>>> {
    // wrong content type or undecodable fields get a code, not axum's plain text
    let Form(form) = form.map_err(|e| ApiError::MalformedBody(e.body_text()))?;
    let selection = form.into_selection()?;
    let readings = blocking(service, move |svc| svc.readings(&selection)).await?;
    Ok(Json(readings))
}

async fn summary(State(service): State<ReadingService>) -> ApiResult<Json<Vec<DeviceSummary>>> {
    let summaries = blocking(service, |svc| svc.summary()).await?;
    Ok(Json(summaries))
}

async fn list_devices(State(service): State<ReadingService>) -> ApiResult<Json<Vec<DeviceEntry>>> {
    let ids = blocking(service, |svc| svc.devices()).await?;
    Ok(Json(
        ids.into_iter()
            .map(|device_uuid| DeviceEntry { device_uuid })
            .collect(),
    ))
}
