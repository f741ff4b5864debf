//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/upload` | Ingest a multipart `file`, or JSON `{type, url?, text?}` |
//! | `POST` | `/api/analyze` | Analyze `{content: ContentItem[]}` |
//! | `POST` | `/api/save-result` | Archive a result object with a `title` |
//! | `GET`  | `/api/save-result` | List archived results, newest first |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Errors are `{"error": "<message>"}`. Bad input is a 400 carrying the
//! specific message; every other failure is logged and answered with a 500
//! and the endpoint's generic message.
//!
//! # Lifecycle
//!
//! The key-value store is opened once before binding, shared by every
//! handler through [`AppState`], and closed after graceful shutdown
//! (Ctrl-C).

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::analyze::analyze_and_store;
use crate::archive::{list_results, save_result, SaveResponse, SavedResults};
use crate::config::Config;
use crate::error::AppError;
use crate::gateway::{ChatCompletionsGateway, CompletionGateway};
use crate::ingest::{ingest_file, ingest_request, IngestRequest, UploadedFile};
use crate::models::{AnalysisResult, AnalysisSource};
use crate::store::{KvStore, SqliteKvStore};

const UPLOAD_FAILED: &str = "Upload failed";
const ANALYSIS_FAILED: &str = "Analysis failed";
const SAVE_FAILED: &str = "Failed to save result";
const LIST_FAILED: &str = "Failed to retrieve saved results";
const INVALID_BODY: &str = "Invalid request body";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: Arc<dyn KvStore>,
    gateway: Arc<dyn CompletionGateway>,
    /// Outbound client for web-page fetches.
    http: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn KvStore>,
        gateway: Arc<dyn CompletionGateway>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            config,
            store,
            gateway,
            http,
        }
    }
}

/// Outbound HTTP client shared by the gateway and web extraction.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("content-insight/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Builds the router with every endpoint and the CORS and body-limit layers.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = DefaultBodyLimit::max(state.config.server.max_upload_bytes);

    Router::new()
        .route("/api/upload", post(handle_upload))
        .route("/api/analyze", post(handle_analyze))
        .route(
            "/api/save-result",
            post(handle_save_result).get(handle_list_results),
        )
        .route("/health", get(handle_health))
        .layer(body_limit)
        .layer(cors)
        .with_state(state)
}

/// Starts the server with the completion gateway described by `[gateway]`.
///
/// If the credential variable is unset the server still runs; analyses are
/// then made of fallback content.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let gateway = ChatCompletionsGateway::from_config(http_client()?, &config.gateway);
    if !gateway.is_configured() {
        tracing::warn!(
            env = %config.gateway.api_key_env,
            "completion API key not set, analyses will use fallback content"
        );
    }
    run_server_with_gateway(config, Arc::new(gateway)).await
}

/// Starts the server with a caller-supplied completion gateway.
///
/// Opens the SQLite store, purges expired records, and serves until Ctrl-C.
pub async fn run_server_with_gateway(
    config: &Config,
    gateway: Arc<dyn CompletionGateway>,
) -> anyhow::Result<()> {
    let store = Arc::new(SqliteKvStore::open(config).await?);
    info!(path = %config.store.path.display(), "store opened");

    let purged = store.purge_expired().await?;
    if purged > 0 {
        info!(purged, "expired records removed");
    }

    let state = AppState::new(
        Arc::new(config.clone()),
        store.clone(),
        gateway,
        http_client()?,
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("listening on http://{}", listener.local_addr()?);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    store.close().await;
    info!("store closed");

    served?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            error!(error = %e, "cannot listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

// ============ Error response ============

/// Flat `{"error": ...}` body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct ErrorResponse {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Maps a handler error onto the public contract, logging anything that
/// is not the client's fault.
fn error_response(err: AppError, generic: &str) -> ErrorResponse {
    if err.is_client_error() {
        return ErrorResponse {
            status: StatusCode::BAD_REQUEST,
            message: err.to_string(),
        };
    }
    error!(error = %err, "{}", generic);
    ErrorResponse {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: generic.to_string(),
    }
}

/// Parses a JSON body regardless of the declared content type.
fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|_| AppError::invalid(INVALID_BODY))
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

// ============ POST /api/upload ============

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("multipart/form-data"))
        .unwrap_or(false)
}

async fn read_file_field(state: &AppState, request: Request) -> Result<UploadedFile, AppError> {
    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|_| AppError::invalid(INVALID_BODY))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::invalid(INVALID_BODY))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|_| AppError::invalid(INVALID_BODY))?;
        return Ok(UploadedFile {
            name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(AppError::invalid("No file provided"))
}

async fn upload(state: &AppState, request: Request) -> Result<serde_json::Value, AppError> {
    if is_multipart(&request) {
        let file = read_file_field(state, request).await?;
        return ingest_file(state.store.as_ref(), &state.config, file).await;
    }

    let body = Bytes::from_request(request, state)
        .await
        .map_err(|_| AppError::invalid(INVALID_BODY))?;
    let ingest: IngestRequest = parse_json(&body)?;
    ingest_request(state.store.as_ref(), &state.http, &state.config, ingest).await
}

/// Handler for `POST /api/upload`.
async fn handle_upload(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<serde_json::Value>, ErrorResponse> {
    upload(&state, request)
        .await
        .map(Json)
        .map_err(|e| error_response(e, UPLOAD_FAILED))
}

// ============ POST /api/analyze ============

#[derive(Deserialize)]
struct AnalyzeRequest {
    #[serde(default)]
    content: Option<Vec<AnalysisSource>>,
}

/// Handler for `POST /api/analyze`.
///
/// The analysis runs on its own task, so it finishes and is stored even if
/// the client disconnects first.
async fn handle_analyze(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AnalysisResult>, ErrorResponse> {
    let request: AnalyzeRequest =
        parse_json(&body).map_err(|e| error_response(e, ANALYSIS_FAILED))?;

    let task = tokio::spawn(async move {
        analyze_and_store(
            state.store.as_ref(),
            state.gateway.as_ref(),
            &state.config,
            request.content,
        )
        .await
    });

    let result = match task.await {
        Ok(result) => result,
        Err(e) => Err(AppError::Internal(e.to_string())),
    };
    result
        .map(Json)
        .map_err(|e| error_response(e, ANALYSIS_FAILED))
}

// ============ /api/save-result ============

/// Handler for `POST /api/save-result`.
async fn handle_save_result(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SaveResponse>, ErrorResponse> {
    let parsed: Option<serde_json::Value> = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(parse_json(&body).map_err(|e| error_response(e, SAVE_FAILED))?)
    };

    save_result(state.store.as_ref(), &state.config, parsed)
        .await
        .map(Json)
        .map_err(|e| error_response(e, SAVE_FAILED))
}

/// Handler for `GET /api/save-result`.
async fn handle_list_results(
    State(state): State<AppState>,
) -> Result<Json<SavedResults>, ErrorResponse> {
    list_results(state.store.as_ref())
        .await
        .map(Json)
        .map_err(|e| error_response(e, LIST_FAILED))
}
