pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::store::Store;
use crate::sync::{RemoteClient, SyncHandle};

/// Shared state injected into every handler. The store is the single
/// shared mutable resource; everything else is clonable plumbing.
pub struct AppState {
    pub store: Arc<Store>,
    pub sync: SyncHandle,
    pub remote: Option<Arc<RemoteClient>>,
    pub http: reqwest::Client,
    pub config: Arc<Config>,
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();
    let dashboard = ServeDir::new(&state.config.dashboard_dir);

    Router::new()
        .route("/api/feed", get(handlers::get_feed))
        .route("/api/saved", get(handlers::get_saved))
        .route("/api/all", get(handlers::get_all))
        .route("/api/stats", get(handlers::get_stats))
        .route("/api/refresh", post(handlers::refresh))
        .route("/api/save", post(handlers::save))
        .route("/api/unsave", post(handlers::unsave))
        .route("/api/sync", post(handlers::full_sync))
        .route("/api/pull", post(handlers::pull))
        .fallback_service(dashboard)
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let port = state.config.port;
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    tracing::info!(port, "Dashboard live at http://localhost:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}
