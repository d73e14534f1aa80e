//! HTTP invocation endpoint.
//!
//! Lets an object-store notification (or anything that can POST the same
//! JSON) trigger the pipeline over HTTP, and exposes stored metadata.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/invoke` | Process the first record of an event notification |
//! | `GET`  | `/metadata?filename=…` | Stored metadata record for a file |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Response Contract
//!
//! `POST /invoke` answers with the pipeline's status code and body:
//!
//! ```json
//! { "message": "CSV file processed successfully", "metadata": { "filename": "…", … } }
//! ```
//!
//! or, for 400/500:
//!
//! ```json
//! { "error": "Error parsing CSV file: …" }
//! ```

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::ingest::build_pipeline;
use crate::models::InvocationResponse;
use crate::pipeline::{event_error_response, IngestPipeline};
use crate::records::find_record;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<IngestPipeline>,
}

/// Starts the HTTP server on `[server].bind`.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(build_pipeline(config).await?);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("listening on http://{}", config.server.bind);

    axum::serve(listener, router(pipeline)).await?;
    Ok(())
}

/// Build the router around an existing pipeline.
pub fn router(pipeline: Arc<IngestPipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/invoke", post(handle_invoke))
        .route("/metadata", get(handle_metadata))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { pipeline })
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for InvocationResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body)).into_response()
    }
}

// ============ POST /invoke ============

/// The body is read raw so that unparseable JSON still gets the pipeline's
/// `{ "error": … }` contract instead of the extractor's plain-text rejection.
async fn handle_invoke(State(state): State<AppState>, body: Bytes) -> InvocationResponse {
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(event) => state.pipeline.clone().invoke(event).await,
        Err(e) => event_error_response(anyhow::Error::new(e).context("request body is not valid JSON")),
    }
}

// ============ GET /metadata ============

#[derive(Deserialize)]
struct MetadataQuery {
    filename: String,
}

async fn handle_metadata(
    State(state): State<AppState>,
    Query(query): Query<MetadataQuery>,
) -> Response {
    let table = &state.pipeline.options().table;
    match find_record(state.pipeline.metadata_store().as_ref(), table, &query.filename).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("no metadata stored for: {}", query.filename),
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
