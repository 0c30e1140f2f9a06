//! Serve mode: open the stores, build the release engine, run the API.

use std::net::SocketAddr;
use std::sync::Arc;

use rollgate_core::RollgateConfig;
use rollgate_core::config::StorageBackend;
use rollgate_release::Releases;
use rollgate_state::StateStore;
use rollgate_storage::{FilesystemStore, MemoryStore, ObjectStore};
use tracing::{error, info, warn};

pub async fn run(config: RollgateConfig) -> anyhow::Result<()> {
    info!("rollgate daemon starting");

    // ── Release store ──────────────────────────────────────────

    std::fs::create_dir_all(&config.server.data_dir)?;
    let db_path = config.server.data_dir.join("releases.redb");
    let state = StateStore::open(&db_path)?;
    info!(path = ?db_path, "release store opened");

    // ── Object store ───────────────────────────────────────────

    let store: Arc<dyn ObjectStore> = match config.storage.backend {
        StorageBackend::Filesystem => {
            let fs = FilesystemStore::new(&config.storage.root).await?;
            info!(root = ?fs.root(), "filesystem object store opened");
            Arc::new(fs)
        }
        StorageBackend::Memory => {
            warn!("memory object store selected; no artifacts are published");
            Arc::new(MemoryStore::new())
        }
    };

    // ── Release engine + API ───────────────────────────────────

    let releases = Arc::new(Releases::new(state, store, &config));
    info!(
        default_sku = %config.release.default_sku,
        initial_rollout = config.release.initial_rollout_percentage,
        cache_ttl_secs = config.cache.ttl_secs,
        public_base_url = %config.storage.public_base_url,
        "release engine initialized"
    );

    let router = rollgate_api::build_router(releases);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("rollgate daemon stopped");
    Ok(())
}
