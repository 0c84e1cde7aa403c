//! Route table for the gateway.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, conversations, health, query, weather};
use crate::state::AppState;

/// Largest accepted pest-detection upload (bytes); beyond it axum
/// answers 413.
const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Build the full gateway router over the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // auth & identity
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/users", get(auth::list_users))
        .route("/auth/users/:id/manage", post(auth::manage))
        // querying
        .route("/ask", post(query::ask))
        .route("/agent", post(query::agent))
        .route("/rag", post(query::rag))
        .route("/predict_yield", post(query::predict_yield))
        .route(
            "/detect_pest",
            post(query::detect_pest).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route("/translate", post(query::translate))
        // weather
        .route("/weather", post(weather::weather))
        .route("/weather/locations", get(weather::locations))
        .route("/weather/cache/clear", post(weather::cache_clear))
        // conversations
        .route("/conversations/save", post(conversations::save))
        .route("/conversations/list", post(conversations::list))
        .route("/conversations/get", post(conversations::get))
        .route("/conversations/delete", post(conversations::delete))
        // ops
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
