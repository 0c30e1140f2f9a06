//! Operator handlers: persisted releases, rollout percentages, cache control.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::info;

use crate::ApiState;
use crate::handlers::{ApiResponse, error_response, parse_kind, release_error};

/// Optional `?kind=` filter.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ListParams {
    pub kind: Option<String>,
}

/// GET /api/v1/releases
pub async fn list_releases(
    State(state): State<ApiState>,
    Query(params): Query<ListParams>,
) -> Response {
    let kind = match params.kind.as_deref() {
        Some(kind) => match parse_kind(kind) {
            Ok(kind) => Some(kind),
            Err(resp) => return resp,
        },
        None => None,
    };
    match state.releases.list_releases(kind).await {
        Ok(releases) => ApiResponse::ok(releases).into_response(),
        Err(e) => release_error(e),
    }
}

/// Request body to change a rollout percentage.
#[derive(Debug, serde::Deserialize)]
pub struct RolloutRequest {
    pub percentage: u32,
}

/// PUT /api/v1/releases/:kind/:version/rollout
pub async fn set_rollout(
    State(state): State<ApiState>,
    Path((kind, version)): Path<(String, String)>,
    Json(req): Json<RolloutRequest>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };
    let percentage = match u8::try_from(req.percentage) {
        Ok(pct) if pct <= 100 => pct,
        _ => {
            return error_response(
                &format!("rollout percentage {} exceeds 100", req.percentage),
                StatusCode::BAD_REQUEST,
            )
            .into_response();
        }
    };
    match state.releases.set_rollout(kind, &version, percentage).await {
        Ok(release) => ApiResponse::ok(release).into_response(),
        Err(e) => release_error(e),
    }
}

/// POST /api/v1/cache/clear
pub async fn clear_cache(State(state): State<ApiState>) -> Response {
    state.releases.clear_cache();
    info!("release cache cleared by operator");
    ApiResponse::ok("cleared").into_response()
}

/// GET /api/v1/cache/stats
pub async fn cache_stats(State(state): State<ApiState>) -> Response {
    let (metadata, redirects) = state.releases.cache_stats();
    ApiResponse::ok(serde_json::json!({
        "metadata": metadata,
        "redirects": redirects,
    }))
    .into_response()
}
