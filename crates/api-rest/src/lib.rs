//! # API REST
//!
//! Processing service for HealthRecord.
//!
//! Handles:
//! - `POST /process`: materialises a document record for a stored upload
//! - `GET /health`
//! - OpenAPI/Swagger documentation at `/swagger-ui`
//!
//! Uses `api-shared` for the wire types and the API key check.

#![warn(rust_2018_idioms)]

pub mod processing;

use api_shared::auth::validate_api_key;
use api_shared::{HealthRes, HealthService, ProcessReq, ProcessRes, API_KEY_HEADER};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use healthrec_core::backends::LocalBackends;
use healthrec_core::CoreConfig;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use processing::{ProcessFailure, ProcessingService};

pub const REST_ADDR_VAR: &str = "HEALTHREC_REST_ADDR";
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    processing: Arc<ProcessingService>,
    api_key: Option<String>,
}

impl AppState {
    pub fn new(processing: Arc<ProcessingService>, api_key: Option<String>) -> Self {
        Self {
            processing,
            api_key,
        }
    }

    /// State wired to the local backends under the configured data directory.
    pub fn from_config(cfg: &CoreConfig) -> anyhow::Result<Self> {
        let backends = LocalBackends::open(cfg)?;
        let processing = ProcessingService::new(
            backends.storage.files().clone(),
            backends.documents.clone(),
            cfg.auth_dir(),
        );
        Ok(Self::new(
            Arc::new(processing),
            cfg.api_key().map(str::to_owned),
        ))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, process),
    components(schemas(HealthRes, ProcessReq, ProcessRes))
)]
struct ApiDoc;

/// Builds the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/process", post(process))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the processing service on `addr` until the server fails.
pub async fn serve(cfg: &CoreConfig, addr: &str) -> anyhow::Result<()> {
    let state = AppState::from_config(cfg)?;

    tracing::info!("++ Starting HealthRecord processing service on {}", addr);
    tracing::info!("++ Data directory: {}", cfg.data_dir().display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/process",
    request_body = ProcessReq,
    responses(
        (status = 200, description = "Document record created", body = ProcessRes),
        (status = 400, description = "Bad request", body = ProcessRes),
        (status = 401, description = "Missing or invalid API key", body = ProcessRes),
        (status = 404, description = "No stored file for the request", body = ProcessRes),
        (status = 500, description = "Internal server error", body = ProcessRes)
    )
)]
/// Materialise a document record for a stored upload
///
/// Looks up the object stored under `{user_id}/{file_name}` and writes an active document
/// record for it. Requests must carry `x-api-key` when the service has an API key configured.
#[axum::debug_handler]
async fn process(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ProcessReq>,
) -> (StatusCode, Json<ProcessRes>) {
    let provided = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    if let Err(rejection) = validate_api_key(provided, state.api_key.as_deref()) {
        tracing::warn!("Rejected processing request: {}", rejection);
        return (
            StatusCode::UNAUTHORIZED,
            Json(ProcessRes::failed(rejection.to_string())),
        );
    }

    match state.processing.process(&req).await {
        Ok(record) => (
            StatusCode::OK,
            Json(ProcessRes::ok(format!(
                "{} indexed as {}",
                record.original_file_name, record.category
            ))),
        ),
        Err(e) => {
            let status = match &e {
                ProcessFailure::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                ProcessFailure::NotFound(_) => StatusCode::NOT_FOUND,
                ProcessFailure::Storage(_) | ProcessFailure::Accounts(_) | ProcessFailure::Store(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            tracing::error!("Process error: {}", e);
            (status, Json(ProcessRes::failed(e.to_string())))
        }
    }
}
