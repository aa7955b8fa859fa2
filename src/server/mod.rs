use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{Method, Uri};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::session::SessionStore;

pub mod api;
pub mod routes;

use routes::HttpResponse;

pub struct AppState {
    pub config: AppConfig,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let sessions = SessionStore::new(config.session_ttl_secs);
        Self { config, sessions }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let mut router = Router::new();
    if state.config.assets_dir.is_dir() {
        router = router.nest_service("/assets", ServeDir::new(&state.config.assets_dir));
    }
    router
        .fallback(dispatch)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn dispatch(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> HttpResponse {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    // Spreadsheet parsing is CPU bound.
    let handled = tokio::task::spawn_blocking(move || {
        routes::route_request(&state, method.as_str(), &path, &body)
    })
    .await;
    match handled {
        Ok(response) => response,
        Err(err) => {
            warn!(%err, "request handler panicked");
            routes::error_response(500, "Internal Server Error", "request handler failed")
        }
    }
}

pub async fn serve(config: AppConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!(bind = %config.bind, "geodash server listening");
    let app = router(Arc::new(AppState::new(config)));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

pub fn run_server(config: AppConfig) -> std::io::Result<()> {
    tokio::runtime::Runtime::new()?.block_on(serve(config))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
