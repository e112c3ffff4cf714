use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clubhouse::{
    build_router,
    config::ServerConfig,
    session::{self, FileStore, MemoryCache, MemoryStore, SessionCoordinator, SessionStore},
    state::AppState,
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clubhouse=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting clubhouse...");

    let config = ServerConfig::from_env();

    let store: Arc<dyn SessionStore> = match &config.data_dir {
        Some(dir) => {
            tracing::info!("Persisting sessions to {}", dir.display());
            Arc::new(FileStore::new(dir.clone()))
        }
        None => {
            tracing::warn!("CLUB_DATA_DIR not set, sessions are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let cache = MemoryCache::new();
    session::spawn_cache_sweeper(cache.clone(), Duration::from_secs(60));

    let coordinator = SessionCoordinator::new(Arc::new(cache), store, config.cache_policy);
    let state = Arc::new(AppState::new(coordinator, config.pacing));

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
