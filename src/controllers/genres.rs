use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::{bad_request, conflict, internal_error, is_unique_violation, not_found, ApiResult};
use crate::models::Genre;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/genres", get(list_genres).post(create_genre))
        .route(
            "/genres/{id}",
            get(get_genre).put(update_genre).delete(delete_genre),
        )
}

// Одно тело для POST и PUT
#[derive(Debug, Deserialize, Validate)]
struct GenreRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1..=255 characters"))]
    name: String,
}

// GET /api/genres
async fn list_genres(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let genres = sqlx::query_as::<_, Genre>("SELECT id, name FROM genres ORDER BY id")
        .fetch_all(&state.db.pool)
        .await
        .map_err(|e| internal_error("list_genres sql error", e))?;

    Ok(Json(genres))
}

// POST /api/genres
async fn create_genre(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenreRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate().map_err(|e| bad_request(&e.to_string()))?;

    let genre =
        sqlx::query_as::<_, Genre>("INSERT INTO genres (name) VALUES ($1) RETURNING id, name")
            .bind(&req.name)
            .fetch_one(&state.db.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    conflict("genre with this name already exists")
                } else {
                    internal_error("create_genre sql error", e)
                }
            })?;

    Ok((StatusCode::CREATED, Json(genre)))
}

// GET /api/genres/{id}
async fn get_genre(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let genre = sqlx::query_as::<_, Genre>("SELECT id, name FROM genres WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|e| internal_error("get_genre sql error", e))?
        .ok_or_else(|| not_found("genre not found"))?;

    Ok(Json(genre))
}

// PUT /api/genres/{id}
async fn update_genre(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<GenreRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate().map_err(|e| bad_request(&e.to_string()))?;

    let genre = sqlx::query_as::<_, Genre>(
        "UPDATE genres SET name = $1 WHERE id = $2 RETURNING id, name",
    )
    .bind(&req.name)
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            conflict("genre with this name already exists")
        } else {
            internal_error("update_genre sql error", e)
        }
    })?
    .ok_or_else(|| not_found("genre not found"))?;

    Ok(Json(genre))
}

// DELETE /api/genres/{id}
async fn delete_genre(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let result = sqlx::query("DELETE FROM genres WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map_err(|e| internal_error("delete_genre sql error", e))?;

    if result.rows_affected() == 0 {
        return Err(not_found("genre not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
