mod handlers;
mod middleware;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::EngineConfig;
use crate::db::Database;
use crate::rating::RatingEngine;

pub use middleware::{CurrentUser, SecurityConfig, USER_ID_HEADER};

/// Shared handler state. The engine owns the store it writes through.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RatingEngine<Database>>,
}

impl AppState {
    pub fn new(db: Database, config: &EngineConfig) -> Self {
        Self {
            engine: Arc::new(RatingEngine::from_config(db, config)),
        }
    }
}

/// Router with authentication disabled.
pub fn create_router(db: Database, config: &EngineConfig) -> Router {
    create_router_with_security(AppState::new(db, config), SecurityConfig::disabled())
}

pub fn create_router_with_security(state: AppState, security: SecurityConfig) -> Router {
    let api = Router::new()
        // Catalog
        .route("/books", post(handlers::ensure_book))
        .route("/books/{id}", get(handlers::get_book))
        .route("/bands", get(handlers::list_bands))
        // Ratings
        .route("/ratings", get(handlers::list_ratings))
        // Comparison sessions
        .route("/sessions", post(handlers::start_session))
        .route("/sessions/{id}", get(handlers::get_session))
        .route("/sessions/{id}", delete(handlers::cancel_session))
        .route("/sessions/{id}/choice", post(handlers::choose))
        .route("/sessions/{id}/undo", post(handlers::undo))
        .route("/sessions/{id}/submit", post(handlers::submit))
        .layer(axum::middleware::from_fn_with_state(
            security.clone(),
            middleware::auth_middleware,
        ))
        // Health stays reachable without credentials
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(security.cors_layer()),
        )
        .with_state(state)
}
