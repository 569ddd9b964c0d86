//! HTTP routes over a [`RenderService`].

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;

use framecast_common::config::{StorageBackend, StorageConfig};
use framecast_common::error::{FramecastError, FramecastResult};
use framecast_job_model::job::{JobKey, RenderJob};

use crate::service::RenderService;
use crate::tracker::TrackerError;

/// Query identifying one session.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

impl From<SessionQuery> for JobKey {
    fn from(query: SessionQuery) -> Self {
        JobKey::new(query.user_id, query.session_id)
    }
}

fn session_key(query: Result<Query<SessionQuery>, QueryRejection>) -> Result<JobKey, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?;
    Ok(query.into())
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub message: &'static str,
    #[serde(rename = "jobId")]
    pub job_id: u64,
}

/// Error body: `{"message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        let status = match &err {
            TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
            TrackerError::NotReady { .. } => StatusCode::CONFLICT,
            TrackerError::JobFailed { .. }
            | TrackerError::InvalidTransition { .. }
            | TrackerError::Superseded { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<FramecastError> for ApiError {
    fn from(err: FramecastError) -> Self {
        let status = match &err {
            FramecastError::Validation { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "message": self.message })),
        )
            .into_response()
    }
}

/// Bind `addr` and serve `app` until the process is stopped.
pub async fn serve(app: Router, addr: &str) -> FramecastResult<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Render service listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| FramecastError::http(format!("server stopped: {e}")))
}

/// The API routes plus, with local storage, the published videos mounted
/// at the path of `public_base_url`.
pub fn app(service: RenderService, storage: &StorageConfig) -> Router {
    let api = router(service);
    if storage.backend != StorageBackend::Local {
        return api;
    }
    match mount_path(&storage.public_base_url) {
        Some(mount) => {
            tracing::info!(
                mount = %mount,
                dir = %storage.local_dir.display(),
                "Serving published videos"
            );
            api.nest_service(&mount, ServeDir::new(&storage.local_dir))
        }
        None => {
            tracing::warn!(
                public_base_url = %storage.public_base_url,
                "public_base_url has no path; published videos are not served"
            );
            api
        }
    }
}

/// Path part of `base_url` without a trailing slash, if not the root.
fn mount_path(base_url: &str) -> Option<String> {
    let rest = base_url
        .split_once("://")
        .map_or(base_url, |(_, rest)| rest);
    let path = rest[rest.find('/')?..].trim_end_matches('/');
    (!path.is_empty()).then(|| path.to_string())
}

pub fn router(service: RenderService) -> Router {
    Router::new()
        .route("/video/render_video", post(render_video))
        .route("/video/render_progress", get(render_progress))
        .route("/video/get_info", get(get_info))
        .route("/health", get(health))
        .with_state(service)
}

pub async fn render_video(
    State(service): State<RenderService>,
    body: Result<Json<RenderJob>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Json(job) = body.map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?;
    let handle = service.submit(job)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            message: "render started",
            job_id: handle.job_id().get(),
        }),
    ))
}

pub async fn render_progress(
    State(service): State<RenderService>,
    query: Result<Query<SessionQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = service.poll(&session_key(query)?)?;
    Ok(Json(snapshot))
}

pub async fn get_info(
    State(service): State<RenderService>,
    query: Result<Query<SessionQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let key = session_key(query)?;
    let result = service.fetch(&key)?;
    tracing::info!(user_id = %key.user_id, session_id = %key.session_id, "Result handed out");
    Ok(Json(result))
}

pub async fn health() -> impl IntoResponse {
    "ok"
}
