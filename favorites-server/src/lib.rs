//! Favorites HTTP API: in-memory store, routes and the CORS layer.

pub mod cors;
pub mod store;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::{Router, middleware};
use favorites_types::{Category, EntityId, FavoriteIds, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub use cors::CorsConfig;
pub use store::FavoritesStore;

/// Server configuration, built from command-line arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}

/// Errors returned by the API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::UnknownCategory(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidId(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    store: Arc<FavoritesStore>,
}

fn parse_category(raw: &str) -> Result<Category, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::UnknownCategory(raw.to_string()))
}

fn parse_user(raw: &str) -> Result<UserId, ApiError> {
    UserId::parse(raw).map_err(|e| ApiError::InvalidId(e.to_string()))
}

fn parse_entity(raw: &str) -> Result<EntityId, ApiError> {
    EntityId::parse(raw).map_err(|e| ApiError::InvalidId(e.to_string()))
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn list_handler(
    State(state): State<AppState>,
    Path((user, category)): Path<(String, String)>,
) -> Result<Json<FavoriteIds>, ApiError> {
    let user = parse_user(&user)?;
    let category = parse_category(&category)?;
    let ids = state.store.list(&user, category).await;
    debug!("Listing {} favorites in {} for {}", ids.len(), category, user);
    Ok(Json(FavoriteIds { category, ids }))
}

async fn put_handler(
    State(state): State<AppState>,
    Path((user, category, id)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    set_membership(&state, &user, &category, &id, true).await
}

async fn delete_handler(
    State(state): State<AppState>,
    Path((user, category, id)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    set_membership(&state, &user, &category, &id, false).await
}

async fn set_membership(
    state: &AppState,
    user: &str,
    category: &str,
    id: &str,
    favorite: bool,
) -> Result<StatusCode, ApiError> {
    let user = parse_user(user)?;
    let category = parse_category(category)?;
    let id = parse_entity(id)?;
    let changed = state.store.set(&user, category, id.clone(), favorite).await;
    debug!(
        "Set {}/{} to {} for {} (changed: {})",
        category, id, favorite, user, changed
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn not_found_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Build the HTTP API router over `store`, wrapped in the CORS layer.
pub fn build_router(store: Arc<FavoritesStore>, cors: CorsConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/users/{user}/favorites/{category}", get(list_handler))
        .route(
            "/api/v1/users/{user}/favorites/{category}/{id}",
            axum::routing::put(put_handler).delete(delete_handler),
        )
        .fallback(not_found_handler)
        .with_state(AppState { store })
        .layer(middleware::from_fn_with_state(
            Arc::new(cors),
            cors::cors_middleware,
        ))
}
