//! HTTP API.
//!
//! Exposes sessions over JSON so a web front end (upload widget, chat
//! bubbles) can drive the pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/sessions` | Create a session, returns `{session_id}` |
//! | `POST` | `/sessions/{id}/documents` | Replace the corpus: `{documents: [{id, content_base64}]}` |
//! | `POST` | `/sessions/{id}/ask` | Ask a question: `{question}` → `{answer, history, sources}` |
//! | `GET`  | `/sessions/{id}/history` | Conversation so far |
//! | `DELETE` | `/sessions/{id}` | Drop the session's index and history (204) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "no_corpus", "message": "session 'abc' has no corpus; ..." } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request`, `configuration` | 400 |
//! | `payload_too_large` | 413 |
//! | `embedding_model_mismatch`, `no_corpus` | 409 |
//! | `document_read` | 422 |
//! | `embedding`, `generation` | 502 |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.
//!
//! Request bodies are capped at `[server].max_upload_bytes`. Malformed or
//! oversized JSON bodies are answered with the error contract above.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRequest, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use docchat_core::{ConversationTurn, Document};

use crate::config::Config;
use crate::ingest::IngestReport;
use crate::session::{AskResponse, SessionManager};

/// Build the router over an existing session manager.
///
/// `max_upload_bytes` bounds every request body, base64 overhead included.
pub fn router(sessions: Arc<SessionManager>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", post(handle_create_session))
        .route("/sessions/{id}/documents", post(handle_ingest))
        .route("/sessions/{id}/ask", post(handle_ask))
        .route("/sessions/{id}/history", get(handle_history))
        .route("/sessions/{id}", delete(handle_delete_session))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(sessions)
}

/// Start the server on `[server].bind` with providers from `config`.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config, bind: Option<String>) -> anyhow::Result<()> {
    let sessions = Arc::new(crate::build_session_manager(config)?);
    let bind_addr = bind.unwrap_or_else(|| config.server.bind.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "docchat server listening");
    println!("docchat server listening on http://{}", bind_addr);

    axum::serve(listener, router(sessions, config.server.max_upload_bytes)).await?;
    Ok(())
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

/// Error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// `Json` whose rejections follow the error contract.
struct ApiJson<T>(T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => Err(AppError {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                code: "payload_too_large".to_string(),
                message: rejection.body_text(),
            }),
            Err(rejection) => Err(bad_request(rejection.body_text())),
        }
    }
}

impl From<docchat_core::Error> for AppError {
    fn from(err: docchat_core::Error) -> Self {
        use docchat_core::Error;

        let status = match &err {
            Error::DocumentRead { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Embedding { .. } | Error::Generation { .. } => StatusCode::BAD_GATEWAY,
            Error::EmbeddingModelMismatch { .. } | Error::NoCorpus { .. } => StatusCode::CONFLICT,
            Error::Configuration { .. } => StatusCode::BAD_REQUEST,
        };
        if status.is_server_error() {
            tracing::warn!(code = err.code(), error = %err, "request failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
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

// ============ POST /sessions ============

#[derive(Serialize)]
struct CreateSessionResponse {
    session_id: String,
}

async fn handle_create_session(
    State(sessions): State<Arc<SessionManager>>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session_id = sessions.create_session();
    (StatusCode::CREATED, Json(CreateSessionResponse { session_id }))
}

// ============ POST /sessions/{id}/documents ============

#[derive(Deserialize)]
struct IngestRequest {
    documents: Vec<UploadedDocument>,
}

#[derive(Deserialize)]
struct UploadedDocument {
    id: String,
    content_base64: String,
}

async fn handle_ingest(
    State(sessions): State<Arc<SessionManager>>,
    Path(session_id): Path<String>,
    ApiJson(request): ApiJson<IngestRequest>,
) -> Result<Json<IngestReport>, AppError> {
    if request.documents.is_empty() {
        return Err(bad_request("documents must not be empty"));
    }

    let documents = request
        .documents
        .into_iter()
        .map(|d| {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(d.content_base64.trim())
                .map_err(|e| bad_request(format!("document '{}': invalid base64: {}", d.id, e)))?;
            Ok(Document::new(d.id, bytes))
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let report = sessions.ingest(&session_id, documents).await?;
    Ok(Json(report))
}

// ============ POST /sessions/{id}/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

async fn handle_ask(
    State(sessions): State<Arc<SessionManager>>,
    Path(session_id): Path<String>,
    ApiJson(request): ApiJson<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if request.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    let response = sessions.ask(&session_id, &request.question).await?;
    Ok(Json(response))
}

// ============ GET /sessions/{id}/history ============

#[derive(Serialize)]
struct HistoryResponse {
    history: Vec<ConversationTurn>,
}

async fn handle_history(
    State(sessions): State<Arc<SessionManager>>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, AppError> {
    let history = sessions.history(&session_id).await?;
    Ok(Json(HistoryResponse { history }))
}

// ============ DELETE /sessions/{id} ============

async fn handle_delete_session(
    State(sessions): State<Arc<SessionManager>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    sessions.remove(&session_id)?;
    Ok(StatusCode::NO_CONTENT)
}
