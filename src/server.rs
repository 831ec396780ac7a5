// HTTP surface - /preview and /download redirect to a resolved stream

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::resolver::{attachment_url, ResolveError, Resolver, ResolverFailure, StreamKind};

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/preview", get(preview))
        .route("/download", get(download))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct PreviewParams {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadParams {
    pub id: Option<String>,
    pub format: Option<String>,
}

/// `type=video` selects video, anything else audio
fn preview_kind(raw: Option<&str>) -> StreamKind {
    match raw.map(str::trim) {
        Some(t) if t.eq_ignore_ascii_case("video") => StreamKind::Video,
        _ => StreamKind::Audio,
    }
}

/// `format=mp3` (the default) selects audio, anything else video
fn download_kind(raw: Option<&str>) -> StreamKind {
    match raw.map(str::trim) {
        None => StreamKind::Audio,
        Some(f) if f.eq_ignore_ascii_case("mp3") => StreamKind::Audio,
        Some(_) => StreamKind::Video,
    }
}

async fn preview(
    State(state): State<AppState>,
    Query(params): Query<PreviewParams>,
) -> Result<Redirect, ApiError> {
    let kind = preview_kind(params.kind.as_deref());
    let id = params.id.unwrap_or_default();

    let stream = state.resolver.resolve(&id, kind).await?;
    Ok(Redirect::temporary(&stream.url))
}

async fn download(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
) -> Result<Redirect, ApiError> {
    let kind = download_kind(params.format.as_deref());
    let id = params.id.unwrap_or_default();

    let stream = state.resolver.resolve(&id, kind).await?;
    let target = attachment_url(&stream.url, &stream.display_title, &stream.file_ext());
    Ok(Redirect::temporary(&target))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    retry: bool,
    reason: Option<&'static str>,
}

/// Resolver failure rendered as a JSON response
#[derive(Debug)]
pub struct ApiError(pub ResolverFailure);

impl From<ResolverFailure> for ApiError {
    fn from(failure: ResolverFailure) -> Self {
        Self(failure)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0.error {
            ResolveError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.0.error.to_string(),
            retry: self.0.retry_suggested,
            reason: self.0.reason.map(|r| r.description()),
        };
        (status, Json(body)).into_response()
    }
}
