pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use state::AppState;
use tower_http::trace::TraceLayer;

/// The full application with state attached and request tracing enabled.
pub fn app(state: AppState) -> Router {
    let max_upload_bytes = state.pipeline.settings().max_upload_bytes;
    routes::routes::routes(max_upload_bytes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
