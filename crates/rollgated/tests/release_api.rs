//! End-to-end tests of the release API.
//!
//! Drives the full router (engine, caches, stores) with in-process
//! requests: device checks across rollout buckets, operator rollout
//! changes, cache clearing, download redirects and the integrity gate.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use rollgate_api::build_router;
use rollgate_core::digest::{digest_key, sha256_hex};
use rollgate_core::{ArtifactKind, RollgateConfig};
use rollgate_release::Releases;
use rollgate_state::{NewRelease, StateStore};
use rollgate_storage::{FilesystemStore, MemoryStore};
use tower::ServiceExt;

const BASE: &str = "https://releases.test";

fn publish(store: &MemoryStore, key: &str, body: &str) {
    store.put(key, body.to_string()).unwrap();
    store.put(&digest_key(key), sha256_hex(body.as_bytes())).unwrap();
}

fn seed(state: &StateStore, kind: ArtifactKind, version: &str, pct: u8) {
    state
        .upsert_release(&NewRelease {
            version: version.to_string(),
            kind,
            rollout_percentage: pct,
            url: format!("{BASE}/{kind}/{version}/{kind}.bin"),
            hash: sha256_hex(format!("{kind}-{version}").as_bytes()),
        })
        .unwrap();
}

fn config() -> RollgateConfig {
    let mut config = RollgateConfig::default();
    config.storage.public_base_url = BASE.to_string();
    config
}

/// app 1.1.0 (100%) + 1.2.0 (new), system 3.0.0 (100%).
fn test_app() -> (Router, MemoryStore, StateStore) {
    let store = MemoryStore::new();
    publish(&store, "app/1.1.0/app.bin", "app-1.1.0");
    publish(&store, "app/1.2.0/app.bin", "app-1.2.0");
    publish(&store, "system/3.0.0/system.bin", "system-3.0.0");

    let state = StateStore::open_in_memory().unwrap();
    seed(&state, ArtifactKind::App, "1.1.0", 100);
    seed(&state, ArtifactKind::System, "3.0.0", 100);

    let releases = Releases::new(state.clone(), Arc::new(store.clone()), &config());
    (build_router(Arc::new(releases)), store, state)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn app_version_for(router: &Router, device: &str) -> String {
    let resp = router
        .clone()
        .oneshot(get(&format!("/api/v1/releases/latest?deviceId={device}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    json_body(resp).await["appVersion"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn healthz_responds() {
    let (router, _, _) = test_app();
    let resp = router.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn staged_rollout_by_bucket() {
    let (router, _, state) = test_app();

    // device-89 is in bucket 5, inside the initial 10% rollout.
    assert_eq!(app_version_for(&router, "device-89").await, "1.2.0");
    // device-90 is in bucket 50 and stays on the default release.
    assert_eq!(app_version_for(&router, "device-90").await, "1.1.0");

    let row = state.get_release(ArtifactKind::App, "1.2.0").unwrap().unwrap();
    assert_eq!(row.rollout_percentage, 10);
}

#[tokio::test]
async fn response_has_exactly_six_fields() {
    let (router, _, _) = test_app();
    let resp = router
        .oneshot(get("/api/v1/releases/latest?deviceId=device-89"))
        .await
        .unwrap();
    let body = json_body(resp).await;
    let fields = body.as_object().unwrap();
    assert_eq!(fields.len(), 6);
    assert_eq!(body["appUrl"], format!("{BASE}/app/1.2.0/app.bin"));
    assert_eq!(body["appHash"], sha256_hex(b"app-1.2.0"));
    assert_eq!(body["systemVersion"], "3.0.0");
}

#[tokio::test]
async fn operator_rollout_widens_audience() {
    let (router, _, _) = test_app();
    assert_eq!(app_version_for(&router, "device-90").await, "1.1.0");

    let req = Request::builder()
        .method("PUT")
        .uri("/api/v1/releases/app/1.2.0/rollout")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"percentage":100}"#))
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(app_version_for(&router, "device-90").await, "1.2.0");

    let resp = router
        .oneshot(get("/api/v1/releases?kind=app"))
        .await
        .unwrap();
    let body = json_body(resp).await;
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["rollout_percentage"] == 100));
}

#[tokio::test]
async fn pinned_and_prerelease_requests_skip_the_store() {
    let (router, store, state) = test_app();
    publish(&store, "app/2.0.0-rc.1/app.bin", "app-2.0.0-rc.1");

    let resp = router
        .clone()
        .oneshot(get("/api/v1/releases/latest?deviceId=device-90&prerelease=true"))
        .await
        .unwrap();
    assert_eq!(json_body(resp).await["appVersion"], "2.0.0-rc.1");

    let resp = router
        .oneshot(get(
            "/api/v1/releases/latest?deviceId=device-90&appVersion=%3E%3D1.2.0%20%3C2.0.0",
        ))
        .await
        .unwrap();
    assert_eq!(json_body(resp).await["appVersion"], "1.2.0");

    assert_eq!(state.list_releases(Some(ArtifactKind::App)).unwrap().len(), 1);
}

#[tokio::test]
async fn bare_app_version_is_an_exact_pin() {
    let (router, _, _) = test_app();
    for device in ["device-89", "device-90"] {
        let resp = router
            .clone()
            .oneshot(get(&format!(
                "/api/v1/releases/latest?deviceId={device}&appVersion=1.1.0"
            )))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["appVersion"], "1.1.0");
        assert_eq!(body["appUrl"], format!("{BASE}/app/1.1.0/app.bin"));
    }
}

#[tokio::test]
async fn new_publish_visible_after_cache_clear() {
    let (router, store, _) = test_app();
    assert_eq!(app_version_for(&router, "device-89").await, "1.2.0");

    publish(&store, "app/1.3.0/app.bin", "app-1.3.0");
    assert_eq!(app_version_for(&router, "device-89").await, "1.2.0");

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/cache/clear")
        .body(Body::empty())
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(app_version_for(&router, "device-89").await, "1.3.0");
}

#[tokio::test]
async fn missing_device_id_is_bad_request() {
    let (router, _, _) = test_app();
    let resp = router
        .oneshot(get("/api/v1/releases/latest"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["success"], false);
}

#[tokio::test]
async fn missing_default_release_is_server_error() {
    let store = MemoryStore::new();
    publish(&store, "app/1.0.0/app.bin", "app-1.0.0");
    publish(&store, "system/1.0.0/system.bin", "system-1.0.0");
    let state = StateStore::open_in_memory().unwrap();
    let releases = Releases::new(state, Arc::new(store), &config());
    let router = build_router(Arc::new(releases));

    let resp = router
        .oneshot(get("/api/v1/releases/latest?deviceId=device-90"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn download_redirects_to_sku_artifact() {
    let (router, store, _) = test_app();
    publish(&store, "system/3.1.0/skus/mk2/system.bin", "mk2-system");

    let resp = router
        .clone()
        .oneshot(get("/api/v1/releases/system/download?sku=mk2"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "https://releases.test/system/3.1.0/skus/mk2/system.bin"
    );

    // Default-SKU devices never receive the mk2-only build.
    let resp = router
        .oneshot(get("/api/v1/releases/system/download"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_blocked_on_digest_mismatch() {
    let (router, store, _) = test_app();
    store
        .put("app/1.2.0/app.bin.sha256", sha256_hex(b"something else"))
        .unwrap();

    let resp = router
        .oneshot(get("/api/v1/releases/app/download"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.headers().get(header::LOCATION).is_none());
    let body = json_body(resp).await;
    assert!(body["error"].as_str().unwrap().contains("integrity"));
}

#[tokio::test]
async fn filesystem_backend_and_persistent_store() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("bucket");
    for (key, body) in [
        ("app/1.0.0/app.bin", "app-1.0.0"),
        ("system/2.0.0/system.bin", "system-2.0.0"),
    ] {
        let path = root.join(key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, body).unwrap();
        std::fs::write(root.join(digest_key(key)), format!("{}\n", sha256_hex(body.as_bytes())))
            .unwrap();
    }

    let db_path = dir.path().join("releases.redb");
    {
        let state = StateStore::open(&db_path).unwrap();
        let fs = FilesystemStore::new(&root).await.unwrap();
        let releases = Releases::new(state, Arc::new(fs), &config());
        let router = build_router(Arc::new(releases));

        // forceUpdate records both releases even without a default.
        let resp = router
            .oneshot(get("/api/v1/releases/latest?deviceId=device-1&forceUpdate=true"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["appVersion"], "1.0.0");
        assert_eq!(body["systemVersion"], "2.0.0");
    }

    let state = StateStore::open(&db_path).unwrap();
    let rows = state.list_releases(None).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.rollout_percentage == 10));
}
