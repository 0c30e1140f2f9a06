//! rollgate-api — REST API for rollgate.
//!
//! Device-facing release checks and download redirects, plus operator
//! controls over rollout percentages and the release cache.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/releases/latest` | Release decision for one device |
//! | GET | `/api/v1/releases/{kind}/download` | 307 to the verified latest artifact |
//! | GET | `/api/v1/releases` | List persisted releases |
//! | PUT | `/api/v1/releases/{kind}/{version}/rollout` | Set a rollout percentage |
//! | POST | `/api/v1/cache/clear` | Drop cached metadata and redirects |
//! | GET | `/api/v1/cache/stats` | Cache hit/miss counters |
//! | GET | `/healthz` | Liveness |

pub mod handlers;
pub mod operator;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use rollgate_release::Releases;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub releases: Arc<Releases>,
}

/// Build the complete API router.
pub fn build_router(releases: Arc<Releases>) -> Router {
    let api_state = ApiState { releases };

    let api_routes = Router::new()
        .route("/releases/latest", get(handlers::latest_release))
        .route("/releases/{kind}/download", get(handlers::download))
        .route("/releases", get(operator::list_releases))
        .route("/releases/{kind}/{version}/rollout", put(operator::set_rollout))
        .route("/cache/clear", post(operator::clear_cache))
        .route("/cache/stats", get(operator::cache_stats))
        .with_state(api_state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
