// Module: http
// JSON control routes, HLS delivery and static files

pub mod error;
pub mod health;
pub mod stream;

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::path::Path;
use std::sync::Arc;
use swarmcast_livestream::livestream::StreamHandler;
use swarmcast_livestream::relay::{PeerDirectory, Streamer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};

/// Landing page for browsers hitting the root
pub const INDEX_PAGE: &str = "/static/broadcast.html";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<dyn StreamHandler>,
    pub streamer: Arc<dyn Streamer>,
    pub peers: Arc<dyn PeerDirectory>,
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .merge(health::create_health_router())
        .merge(stream::create_stream_router())
        .nest_service("/static", ServeDir::new(static_dir))
        .route("/", get(redirect_to_index))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn redirect_to_index() -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, INDEX_PAGE)])
}
