//! HTTP API.
//!
//! A thin axum layer over a shared [`RagEngine`]. The server keeps no
//! conversation state; clients send their own history with every question.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Welcome message |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/upload/` | Multipart PDF upload (field `file`), ingested synchronously |
//! | `POST` | `/chat/` | Ask a question, optionally with `chat_history` |
//!
//! `/upload` and `/chat` are accepted without the trailing slash too.
//!
//! # Error Contract
//!
//! Errors are a flat JSON object:
//!
//! ```json
//! { "error": "Only PDF files are allowed." }
//! ```
//!
//! Rejected input is `400`; any pipeline failure is `500` with the error
//! message.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front ends can
//! call the API directly.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::engine::RagEngine;
use crate::extract::is_supported_upload;
use crate::models::{ConversationTurn, QueryResult, Role};

const WELCOME: &str = "Welcome to the Intelli-Doc API. Go to /docs to see the documentation.";
const UPLOAD_OK: &str = "Successfully uploaded and processed.";
const ONLY_PDF: &str = "Only PDF files are allowed.";

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    engine: Arc<RagEngine>,
    upload_dir: Arc<PathBuf>,
}

/// Build the router over an already-open engine.
///
/// Exposed separately from [`run_server`] so the API can be driven
/// in-process.
pub fn router(engine: Arc<RagEngine>, config: &Config) -> Router {
    let state = AppState {
        engine,
        upload_dir: Arc::new(config.storage.upload_dir.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/upload/", post(handle_upload))
        .route("/upload", post(handle_upload))
        .route("/chat/", post(handle_chat))
        .route("/chat", post(handle_chat))
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Open the engine and serve on `[server].bind` until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = Arc::new(RagEngine::open(config).await?);
    let app = router(engine.clone(), config);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("Intellidoc API listening on http://{}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    engine.close().await;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

// ============ GET / and /health ============

#[derive(Serialize)]
struct WelcomeResponse {
    message: &'static str,
}

async fn handle_root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse { message: WELCOME })
}

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

// ============ POST /upload/ ============

#[derive(Serialize)]
struct UploadResponse {
    filename: String,
    status: &'static str,
}

/// Handler for `POST /upload/`.
///
/// Stores the file under the upload directory, then ingests it before
/// responding. Only the final component of the client's filename is used.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| bad_request("file field has no filename"))?;
        if !is_supported_upload(&filename) {
            return Err(bad_request(ONLY_PDF));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("cannot read upload: {}", e)))?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) = upload.ok_or_else(|| bad_request("No file provided."))?;
    let name = Path::new(&filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| bad_request("invalid filename"))?;

    tokio::fs::create_dir_all(state.upload_dir.as_path())
        .await
        .map_err(|e| internal(format!("Failed to process file: {}", e)))?;
    let path = state.upload_dir.join(&name);
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| internal(format!("Failed to process file: {}", e)))?;

    info!(file = %path.display(), bytes = bytes.len(), "upload stored");

    // Run to completion even if the client disconnects.
    let engine = state.engine.clone();
    let task_path = path.clone();
    let outcome = tokio::spawn(async move { engine.ingest_file(&task_path).await })
        .await
        .map_err(|e| internal(format!("Failed to process file: {}", e)))?;

    match outcome {
        Ok(chunks) => {
            info!(file = %path.display(), chunks, "upload ingested");
            Ok(Json(UploadResponse {
                filename: name,
                status: UPLOAD_OK,
            }))
        }
        Err(e) => {
            error!(file = %path.display(), error = %e, "upload failed");
            Err(internal(format!("Failed to process file: {}", e)))
        }
    }
}

// ============ POST /chat/ ============

#[derive(Deserialize)]
struct ChatRequest {
    question: String,
    /// `null` and an absent field both mean no prior turns.
    #[serde(default)]
    chat_history: Option<Vec<HistoryTurn>>,
}

/// Wire form of a history turn; the role is checked after parsing so that
/// unknown roles can be skipped instead of failing the request.
#[derive(Deserialize)]
struct HistoryTurn {
    role: String,
    content: String,
}

fn parse_history(turns: Vec<HistoryTurn>) -> Vec<ConversationTurn> {
    turns
        .into_iter()
        .filter_map(|t| match Role::parse(&t.role) {
            Some(role) => Some(ConversationTurn {
                role,
                content: t.content,
            }),
            None => {
                warn!(role = %t.role, "ignoring history turn with unknown role");
                None
            }
        })
        .collect()
}

/// Handler for `POST /chat/`.
async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<QueryResult>, AppError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    let history = parse_history(request.chat_history.unwrap_or_default());

    let engine = state.engine.clone();
    let question = request.question;
    let outcome = tokio::spawn(async move { engine.ask(&question, &history).await })
        .await
        .map_err(|e| internal(e.to_string()))?;

    outcome.map(Json).map_err(|e| {
        error!(error = %e, "chat failed");
        internal(e.to_string())
    })
}
