//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the conversion and layout endpoints plus the `/elkgraph` websocket
//! under one Axum router. When a client directory is configured, unmatched
//! paths are served from it as static files.

pub mod conversion;
pub mod layout;
pub mod ws;

use std::path::Path;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// API routes shared by every deployment.
fn api_routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/conversion", post(conversion::convert))
        .route("/layout", post(layout::layout))
        .route("/versions", get(layout::versions))
        .route("/elkgraph", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .with_state(state)
}

/// Full application router. `client_dir` serves static files for unmatched paths.
pub fn app(state: AppState, client_dir: Option<&Path>) -> Router {
    let router = api_routes(state);
    let router = match client_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true)),
        None => router,
    };
    router
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
