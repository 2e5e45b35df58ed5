use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{AppState, CurrentUser};
use crate::error::RatingError;
use crate::models::*;

type ApiResult<T> = Result<T, (StatusCode, String)>;

// ============================================================
// Error Handling
// ============================================================

/// Map an engine error to a response.
///
/// Storage failures are logged in full and reported to the client with a
/// generic message; every other variant is safe to expose as-is.
fn api_error(e: RatingError) -> (StatusCode, String) {
    let status = match &e {
        RatingError::Validation(_) => StatusCode::BAD_REQUEST,
        RatingError::NotFound(_) => StatusCode::NOT_FOUND,
        RatingError::Conflict(_) => StatusCode::CONFLICT,
        RatingError::Busy(_) => StatusCode::LOCKED,
        RatingError::Io(inner) => {
            tracing::error!("Internal error: {:#}", inner);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            );
        }
    };

    tracing::warn!("Request rejected: {}", e);
    (status, e.to_string())
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Catalog
// ============================================================

pub async fn ensure_book(
    State(state): State<AppState>,
    Json(input): Json<BookRef>,
) -> ApiResult<Json<Book>> {
    state.engine.ensure_book(input).map(Json).map_err(api_error)
}

pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Book>> {
    state.engine.book(id).map(Json).map_err(api_error)
}

pub async fn list_bands(State(state): State<AppState>) -> Json<Vec<BandInfo>> {
    Json(state.engine.bands())
}

// ============================================================
// Ratings
// ============================================================

#[derive(Debug, Deserialize)]
pub struct RatingsQuery {
    pub sentiment: Option<SentimentBand>,
}

pub async fn list_ratings(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<RatingsQuery>,
) -> ApiResult<Json<Vec<RatedBook>>> {
    state
        .engine
        .ratings(user_id, query.sentiment)
        .map(Json)
        .map_err(api_error)
}

// ============================================================
// Comparison sessions
// ============================================================

pub async fn start_session(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(input): Json<StartSessionInput>,
) -> ApiResult<(StatusCode, Json<SessionView>)> {
    state
        .engine
        .start_session(user_id, input)
        .map(|view| (StatusCode::CREATED, Json(view)))
        .map_err(api_error)
}

pub async fn get_session(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionView>> {
    state.engine.session(user_id, id).map(Json).map_err(api_error)
}

pub async fn choose(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<ChoiceInput>,
) -> ApiResult<Json<SessionView>> {
    state
        .engine
        .choose(user_id, id, input.choice)
        .map(Json)
        .map_err(api_error)
}

pub async fn undo(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionView>> {
    state.engine.undo(user_id, id).map(Json).map_err(api_error)
}

pub async fn submit(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<RatingOutcome>)> {
    state
        .engine
        .submit(user_id, id)
        .map(|outcome| (StatusCode::CREATED, Json(outcome)))
        .map_err(api_error)
}

pub async fn cancel_session(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .cancel(user_id, id)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(api_error)
}
