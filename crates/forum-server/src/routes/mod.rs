//! API route modules.

pub mod comments;
mod form;
pub mod health;
pub mod images;
pub mod posts;
pub mod session;

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::{ensure_token, require_valid_session};
use crate::state::AppState;

/// Largest accepted request body (image uploads)
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Body of a `201 Created` response
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: i64,
}

/// Create the main router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    // Public routes (no session)
    let public_routes = Router::new().route("/health", get(health::health_check));

    // Session-gated routes. Layers run outermost-last-added:
    // timeout -> ensure_token -> require_valid_session -> handler
    let protected_routes = Router::new()
        .merge(session::router())
        .merge(posts::router())
        .merge(comments::router())
        .merge(images::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_valid_session,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), ensure_token))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    Router::new()
        .merge(public_routes)
        .nest("/api", protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
