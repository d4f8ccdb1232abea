//! HTTP API server.
//!
//! Exposes upload, chat, and telemetry summaries over JSON.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service name and version |
//! | `GET`  | `/api/health` | Health check (returns version) |
//! | `POST` | `/api/chat` | One conversational turn |
//! | `POST` | `/api/upload?filename=<name>` | Upload a flight log (raw body) |
//! | `GET`  | `/api/telemetry/summary/{file_id}` | Summary and anomaly summary |
//! | `DELETE` | `/api/logs/{file_id}` | Delete a flight log |
//! | `GET`  | `/api/conversations/{id}` | Conversation with its messages |
//! | `DELETE` | `/api/conversations/{id}` | Delete a conversation |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "flight log not found: 42" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `upstream_error` (502),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front ends can
//! call the API directly.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use flight_harness_core::anomaly::AnomalySummary;
use flight_harness_core::{Conversation, QueryResult, Summary};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::chat::ChatError;
use crate::config::Config;
use crate::harness::Harness;
use crate::ingest::UploadOutcome;

/// Builds the harness from `config` and serves on `[server].bind`.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let harness = Harness::from_config(config)?;
    let bind = config.server.bind.clone();
    run_server_with(harness, &bind).await
}

/// Serves an already-built [`Harness`] on `bind`.
pub async fn run_server_with(harness: Harness, bind: &str) -> anyhow::Result<()> {
    let engine = harness.chat.engine_name().to_string();
    let app = router(harness);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(bind, engine = %engine, "flight harness listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Route table with shared state and CORS applied.
pub fn router(harness: Harness) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let upload_limit = harness.config.upload.max_bytes;

    Router::new()
        .route("/", get(handle_root))
        .route("/api/health", get(handle_health))
        .route("/api/chat", post(handle_chat))
        .route(
            "/api/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/telemetry/summary/{file_id}", get(handle_summary))
        .route("/api/logs/{file_id}", axum::routing::delete(handle_delete_log))
        .route(
            "/api/conversations/{id}",
            get(handle_get_conversation).delete(handle_delete_conversation),
        )
        .layer(cors)
        .with_state(harness)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    error!(error = %format!("{:#}", err), "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: format!("{:#}", err),
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Persistence(e) => internal(e),
            upstream => {
                error!(error = %upstream, "turn aborted");
                AppError {
                    status: StatusCode::BAD_GATEWAY,
                    code: "upstream_error",
                    message: upstream.to_string(),
                }
            }
        }
    }
}

// ============ GET / and /api/health ============

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
    version: &'static str,
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Flight Harness API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    question: String,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
}

async fn handle_chat(
    State(harness): State<Harness>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<QueryResult>, AppError> {
    let query = flight_harness_core::Query {
        text: req.question,
        conversation_id: req.conversation_id,
        file_id: req.file_id,
    };
    let result = harness.chat.process_query(query).await?;
    Ok(Json(result))
}

// ============ POST /api/upload ============

#[derive(Deserialize)]
struct UploadParams {
    filename: Option<String>,
}

async fn handle_upload(
    State(harness): State<Harness>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadOutcome>, AppError> {
    let filename = params
        .filename
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| bad_request("filename query parameter is required"))?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let outcome = harness
        .ingestor
        .upload(&filename, &body, content_type)
        .await
        .map_err(internal)?;
    Ok(Json(outcome))
}

// ============ GET /api/telemetry/summary/{file_id} ============

#[derive(Serialize)]
struct SummaryResponse {
    summary: Summary,
    anomaly_summary: Option<AnomalySummary>,
}

async fn handle_summary(
    State(harness): State<Harness>,
    Path(file_id): Path<String>,
) -> Result<Json<SummaryResponse>, AppError> {
    let context = harness
        .context
        .build_prompt_context(&file_id)
        .await
        .map_err(internal)?;
    let summary = context
        .summary
        .ok_or_else(|| not_found(format!("flight log not found: {}", file_id)))?;

    Ok(Json(SummaryResponse {
        summary,
        anomaly_summary: context.anomaly_summary,
    }))
}

// ============ DELETE /api/logs/{file_id} ============

async fn handle_delete_log(
    State(harness): State<Harness>,
    Path(file_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if harness.ingestor.delete(&file_id).await.map_err(internal)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("flight log not found: {}", file_id)))
    }
}

// ============ /api/conversations/{id} ============

async fn handle_get_conversation(
    State(harness): State<Harness>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, AppError> {
    harness
        .conversations
        .get(&id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| not_found(format!("conversation not found: {}", id)))
}

async fn handle_delete_conversation(
    State(harness): State<Harness>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if harness.conversations.delete(&id).await.map_err(internal)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("conversation not found: {}", id)))
    }
}
