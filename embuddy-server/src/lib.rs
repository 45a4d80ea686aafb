// Declare modules to be part of the library crate

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::ServerConfig;
pub use state::AppState;

/// Builds the HTTP router over `state`.
pub fn router(state: AppState) -> Router {
    let body_limit = state.processor.config().max_upload_bytes;

    Router::new()
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/:id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/:id/reset", post(handlers::reset_session))
        .route("/sessions/:id/sets/:set", put(handlers::upload_set))
        .route("/sessions/:id/sets/:set/external", post(handlers::load_external_set))
        .route("/sessions/:id/reduction-input", get(handlers::get_reduction_input))
        .route("/sessions/:id/projection", post(handlers::submit_projection))
        .route("/fields/suggest", post(handlers::suggest_fields))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
