//! File API over HTTP
//!
//! Routes:
//!   GET    /files              - caller's files (JSON)
//!   POST   /files              - multipart upload, first file part
//!   GET    /files/{id}         - decrypted content (?download=1 for attachment)
//!   DELETE /files/{id}         - remove payload and record (204)
//!
//! The caller is identified by the trusted `x-lockbox-user-id` and
//! `x-lockbox-role` headers set by the session proxy in front of us.

use anyhow::Result;
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, FromRequestParts, Multipart, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use lockbox_core::{FileId, FileRecord, LockboxError, Principal, Role, UserId};
use lockbox_records::SqliteRecordStore;
use lockbox_storage::OperatorBlobStore;
use lockbox_vault::{Vault, DEFAULT_DISPLAY_NAME};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::metrics::Metrics;

pub const USER_ID_HEADER: &str = "x-lockbox-user-id";
pub const ROLE_HEADER: &str = "x-lockbox-role";

pub type DaemonVault = Vault<SqliteRecordStore, OperatorBlobStore>;

#[derive(Clone)]
pub struct AppState {
    pub vault: Arc<DaemonVault>,
    pub metrics: Metrics,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/files", get(list_files).post(upload_file))
        .route("/files/{id}", get(retrieve_file).delete(delete_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

pub async fn serve(addr: &str, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("http bind {addr}: {e}"))?;

    tracing::info!(addr = %addr, "http: listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("http server: {e}"))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("shutdown signal received");
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Handler error. Callers see only a generic message and a correlation id;
/// the internal detail is logged under the same id.
#[derive(Debug)]
pub enum ApiError {
    Vault(LockboxError),
    Unauthenticated,
    BadRequest(String),
    PayloadTooLarge,
}

impl From<LockboxError> for ApiError {
    fn from(e: LockboxError) -> Self {
        ApiError::Vault(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    correlation_id: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Vault(LockboxError::NotFoundOrDenied) => StatusCode::NOT_FOUND,
            ApiError::Vault(LockboxError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Vault(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            ApiError::Vault(e) => e.public_message(),
            ApiError::Unauthenticated => "Authentication required.",
            ApiError::BadRequest(_) => "Invalid request.",
            ApiError::PayloadTooLarge => "File too large.",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let correlation_id = uuid::Uuid::new_v4().to_string();

        match &self {
            ApiError::Vault(e) if status.is_server_error() => {
                tracing::error!(status = %status, correlation_id = %correlation_id, error = %e);
            }
            ApiError::Vault(e) => {
                tracing::info!(status = %status, correlation_id = %correlation_id, error = %e);
            }
            ApiError::BadRequest(detail) => {
                tracing::info!(status = %status, correlation_id = %correlation_id, error = %detail);
            }
            _ => {
                tracing::info!(status = %status, correlation_id = %correlation_id);
            }
        }

        let body = ErrorBody {
            error: self.public_message(),
            correlation_id,
        };
        (status, Json(body)).into_response()
    }
}

// ── Principal ────────────────────────────────────────────────────────────────

/// The caller, as asserted by the upstream session layer
pub struct AuthenticatedPrincipal(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_str(parts, USER_ID_HEADER)
            .and_then(|v| v.parse::<i64>().ok())
            .ok_or(ApiError::Unauthenticated)?;
        let role = match header_str(parts, ROLE_HEADER) {
            None => Role::User,
            Some(v) => v.parse::<Role>().map_err(|_| ApiError::Unauthenticated)?,
        };

        Ok(Self(Principal {
            id: UserId(id),
            role,
        }))
    }
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// Listing entry. Storage name and cipher material stay server-side.
#[derive(Debug, Serialize, Deserialize)]
pub struct FileSummary {
    pub id: FileId,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub encrypted: bool,
}

impl From<&FileRecord> for FileSummary {
    fn from(r: &FileRecord) -> Self {
        Self {
            id: r.id,
            display_name: r.display_name.clone(),
            created_at: r.created_at,
            encrypted: r.is_encrypted(),
        }
    }
}

async fn list_files(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
) -> Result<Json<Vec<FileSummary>>, ApiError> {
    let records = state.vault.list_files(&principal).await?;
    Ok(Json(records.iter().map(FileSummary::from).collect()))
}

async fn upload_file(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileSummary>), ApiError> {
    let multipart_error = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(format!("multipart: {e}"))
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await.map_err(multipart_error)?;
        let display_name = if file_name.trim().is_empty() {
            DEFAULT_DISPLAY_NAME.to_string()
        } else {
            file_name
        };

        let record = state
            .vault
            .upload_file(&principal, bytes.to_vec(), &display_name)
            .await?;
        state.metrics.uploads.inc();
        return Ok((StatusCode::CREATED, Json(FileSummary::from(&record))));
    }

    Err(ApiError::BadRequest("no file part in upload".into()))
}

#[derive(Debug, Default, Deserialize)]
pub struct RetrieveQuery {
    pub download: Option<String>,
}

impl RetrieveQuery {
    fn as_attachment(&self) -> bool {
        matches!(self.download.as_deref(), Some("1") | Some("true"))
    }
}

fn parse_file_id(raw: &str) -> Result<FileId, ApiError> {
    raw.parse::<i64>()
        .map(FileId)
        .map_err(|_| ApiError::BadRequest(format!("invalid file id {raw:?}")))
}

async fn retrieve_file(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(id): Path<String>,
    Query(query): Query<RetrieveQuery>,
) -> Result<Response, ApiError> {
    let id = parse_file_id(&id)?;

    let file = match state
        .vault
        .retrieve_file(&principal, id, query.as_attachment())
        .await
    {
        Ok(file) => file,
        Err(e) => {
            if matches!(e, LockboxError::AuthenticationFailure) {
                state.metrics.decrypt_failures.inc();
            }
            return Err(e.into());
        }
    };

    state.metrics.downloads.inc();
    if !file.encrypted {
        state.metrics.legacy_reads.inc();
    }

    // from_bytes keeps non-ASCII filenames; the name is already free of
    // quotes and control characters.
    let disposition = HeaderValue::from_bytes(file.content_disposition().as_bytes())
        .map_err(|e| LockboxError::Other(e.into()))?;
    let content_type = HeaderValue::from_str(&file.mime_type)
        .map_err(|e| LockboxError::Other(e.into()))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CONTENT_LENGTH, file.bytes.len())
        .header("Content-Description", "File Transfer")
        .header(header::EXPIRES, "0")
        .header(header::CACHE_CONTROL, "must-revalidate")
        .header(header::PRAGMA, "public")
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(Body::from(file.bytes))
        .map_err(|e| ApiError::Vault(LockboxError::Other(e.into())))
}

async fn delete_file(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_file_id(&id)?;
    state.vault.delete_file(&principal, id).await?;
    state.metrics.deletes.inc();
    Ok(StatusCode::NO_CONTENT)
}
