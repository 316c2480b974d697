pub mod backend;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod passthrough;
pub mod random;
pub mod relay;
pub mod scheduler;
pub mod state;
pub mod transport;
pub mod wire;

use axum::{
    routing::{get, post},
    Router,
};

/// Assembles the router: the generation endpoint, the proxy's own metrics,
/// and a passthrough for everything else. Non-POST methods on `/completion`
/// fall through to the passthrough like any other path.
pub fn build_app(state: state::AppState) -> Router {
    Router::new()
        .route("/metrics", get(handlers::metrics))
        .route(
            "/completion",
            post(handlers::completion).fallback(passthrough::forward),
        )
        .fallback(passthrough::forward)
        .with_state(state)
}
