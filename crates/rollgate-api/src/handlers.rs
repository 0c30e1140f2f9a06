//! Device-facing handlers.
//!
//! `GET /api/v1/releases/latest` returns the bare six-field release record on
//! success; device firmware parses it directly. Errors use the
//! `{ success, error }` envelope shared with the operator endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::{error, warn};

use rollgate_core::ArtifactKind;
use rollgate_release::{RedirectQuery, ReleaseError, ReleaseQuery};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
pub(crate) struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    pub(crate) fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

pub(crate) fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// HTTP status for a release engine failure.
pub(crate) fn status_for(err: &ReleaseError) -> StatusCode {
    match err {
        ReleaseError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ReleaseError::NotFound(_) => StatusCode::NOT_FOUND,
        ReleaseError::IntegrityFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        ReleaseError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        ReleaseError::NoDefaultRelease(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn release_error(err: ReleaseError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(error = %err, status = status.as_u16(), "release request failed");
    } else {
        warn!(error = %err, status = status.as_u16(), "release request rejected");
    }
    error_response(&err.to_string(), status).into_response()
}

pub(crate) fn parse_kind(kind: &str) -> Result<ArtifactKind, Response> {
    kind.parse::<ArtifactKind>()
        .map_err(|e| error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response())
}

/// Query-string booleans: `true`, `1` and `yes` (any case) are set.
fn flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        let v = v.trim();
        v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes")
    })
}

// ── Release check ──────────────────────────────────────────────

/// Query parameters of a device release check.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestParams {
    pub device_id: Option<String>,
    pub app_version: Option<String>,
    pub system_version: Option<String>,
    pub sku: Option<String>,
    pub prerelease: Option<String>,
    pub force_update: Option<String>,
}

impl From<LatestParams> for ReleaseQuery {
    fn from(params: LatestParams) -> Self {
        Self {
            prerelease: flag(params.prerelease.as_deref()),
            force_update: flag(params.force_update.as_deref()),
            device_id: params.device_id.unwrap_or_default(),
            app_range: params.app_version,
            system_range: params.system_version,
            sku: params.sku,
        }
    }
}

/// GET /api/v1/releases/latest
pub async fn latest_release(
    State(state): State<ApiState>,
    Query(params): Query<LatestParams>,
) -> Response {
    match state.releases.resolve(params.into()).await {
        Ok(release) => Json(release).into_response(),
        Err(e) => release_error(e),
    }
}

// ── Download ───────────────────────────────────────────────────

/// Query parameters of a download redirect.
#[derive(Debug, Default, serde::Deserialize)]
pub struct DownloadParams {
    pub version: Option<String>,
    pub sku: Option<String>,
    pub prerelease: Option<String>,
    pub artifact: Option<String>,
}

/// GET /api/v1/releases/:kind/download
pub async fn download(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
    Query(params): Query<DownloadParams>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };
    let query = RedirectQuery {
        kind,
        prerelease: flag(params.prerelease.as_deref()),
        range: params.version,
        sku: params.sku,
        artifact: params.artifact,
    };
    match state.releases.redirect_target(query).await {
        Ok(url) => Redirect::temporary(&url).into_response(),
        Err(e) => release_error(e),
    }
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
