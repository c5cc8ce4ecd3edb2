//! HTTP router assembly

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use super::health;
use super::state::AppState;
use super::v1;

/// The full application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/v1", v1::create_v1_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
