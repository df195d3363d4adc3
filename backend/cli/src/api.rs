use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio_stream::{wrappers::WatchStream, Stream, StreamExt};
use tracing::{debug, info, warn};

use kaitai_core::{EstimationClient, ImageId, Phase, SessionState, MAX_IMAGES};
use kaitai_media::{detect_mime_type, is_image, sniff_mime_type, SelectedFile};
use kaitai_session::{Estimator, RemoveOutcome, SubmitOutcome};

/// Photos come straight from phones; the axum default of 2 MiB is too small.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

/// Shared application state for API handlers.
pub struct AppState<C> {
    pub estimator: Estimator<C>,
    pub started_at: Instant,
}

impl<C: EstimationClient> AppState<C> {
    pub fn new(estimator: Estimator<C>) -> Self {
        Self {
            estimator,
            started_at: Instant::now(),
        }
    }
}

/// Build the Axum router with all API routes.
pub fn build_router<C: EstimationClient + 'static>(state: Arc<AppState<C>>) -> Router {
    Router::new()
        .route("/api/health", get(health::<C>))
        .route("/api/session", get(get_session::<C>))
        .route("/api/session/events", get(session_events::<C>))
        .route("/api/images", post(upload_images::<C>))
        .route("/api/images/:id", delete(remove_image::<C>))
        .route("/api/estimate", post(request_estimate::<C>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Health check endpoint.
async fn health<C: EstimationClient + 'static>(State(state): State<Arc<AppState<C>>>) -> Json<Value> {
    let client = state.estimator.client();
    Json(json!({
        "status": "ok",
        "service": "kaitai",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": client.name(),
        "credential_configured": client.has_credential(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

async fn get_session<C: EstimationClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
) -> Json<SessionState> {
    Json(state.estimator.snapshot())
}

/// Server-sent stream of session snapshots, one per transition.
async fn session_events<C: EstimationClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = WatchStream::new(state.estimator.subscribe()).filter_map(|snapshot| {
        Event::default()
            .event("session")
            .json_data(&snapshot)
            .ok()
            .map(Ok)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    /// Files received in the request.
    received: usize,
    /// Files refused because they are not images.
    rejected: usize,
    /// Image files that could not be decoded.
    skipped: usize,
    /// Decoded images not added because of the limit.
    not_added: usize,
    limit: usize,
    session: SessionState,
}

/// Accept one or more photos as multipart fields.
async fn upload_images<C: EstimationClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut received = 0;
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!(error = %e, "Malformed multipart upload");
        api_error(StatusCode::BAD_REQUEST, format!("malformed upload: {e}"))
    })? {
        let name = field
            .file_name()
            .or_else(|| field.name())
            .unwrap_or("upload")
            .to_string();
        let declared = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| {
            api_error(StatusCode::BAD_REQUEST, format!("failed to read {name}: {e}"))
        })?;
        received += 1;

        if !looks_like_image(&name, declared.as_deref(), &bytes) {
            debug!(name = %name, mime = ?declared, "Rejecting non-image upload");
            continue;
        }
        files.push(SelectedFile::upload(name, declared, bytes));
    }

    let accepted = files.len();
    let report = state.estimator.submit_files(files).await;
    if report.outcome == SubmitOutcome::Busy {
        return Err(api_error(
            StatusCode::CONFLICT,
            "an estimate is in progress; try again when it finishes",
        ));
    }

    info!(
        received,
        accepted,
        decoded = report.decoded,
        not_added = report.not_added(),
        "Upload processed"
    );
    Ok(Json(UploadResponse {
        received,
        rejected: received - accepted,
        skipped: report.skipped(),
        not_added: report.not_added(),
        limit: MAX_IMAGES,
        session: state.estimator.snapshot(),
    }))
}

/// Image filter applied by this surface before intake.
///
/// A declared type is trusted when present; a generic one falls back to
/// the file extension and then the leading bytes.
fn looks_like_image(name: &str, declared: Option<&str>, bytes: &[u8]) -> bool {
    match declared {
        Some(mime) if mime != "application/octet-stream" => is_image(mime),
        _ => is_image(detect_mime_type(Path::new(name))) || sniff_mime_type(bytes).is_some(),
    }
}

async fn remove_image<C: EstimationClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
    UrlPath(id): UrlPath<String>,
) -> Result<Json<Value>, ApiError> {
    let id: ImageId = id
        .parse()
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, format!("'{id}' is not an image id")))?;

    let removed = match state.estimator.remove(&id).await {
        RemoveOutcome::Removed => true,
        RemoveOutcome::NotFound => false,
        RemoveOutcome::Busy => {
            return Err(api_error(
                StatusCode::CONFLICT,
                "images cannot be removed while an estimate is in progress",
            ))
        }
    };

    Ok(Json(json!({
        "removed": removed,
        "session": state.estimator.snapshot(),
    })))
}

/// Run the estimate pipeline and return the resulting session.
async fn request_estimate<C: EstimationClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
) -> Result<Json<SessionState>, ApiError> {
    let session = state.estimator.get_estimate().await;
    if session.phase == Phase::Loading {
        return Err(api_error(
            StatusCode::CONFLICT,
            "an estimate is already in progress",
        ));
    }
    Ok(Json(session))
}
