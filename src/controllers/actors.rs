use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{bad_request, internal_error, not_found, ApiResult};
use crate::models::Actor;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/actors", get(list_actors).post(create_actor))
        .route(
            "/actors/{id}",
            get(get_actor).put(update_actor).delete(delete_actor),
        )
}

#[derive(Debug, Deserialize, Validate)]
struct ActorRequest {
    #[validate(length(min = 1, max = 255, message = "first_name must be 1..=255 characters"))]
    first_name: String,
    #[validate(length(min = 1, max = 255, message = "surname must be 1..=255 characters"))]
    surname: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ActorResponse {
    pub(crate) id: i64,
    pub(crate) first_name: String,
    pub(crate) surname: String,
    pub(crate) full_name: String,
}

impl From<Actor> for ActorResponse {
    fn from(actor: Actor) -> Self {
        let full_name = actor.full_name();
        Self {
            id: actor.id,
            first_name: actor.first_name,
            surname: actor.surname,
            full_name,
        }
    }
}

// GET /api/actors
async fn list_actors(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let actors =
        sqlx::query_as::<_, Actor>("SELECT id, first_name, surname FROM actors ORDER BY id")
            .fetch_all(&state.db.pool)
            .await
            .map_err(|e| internal_error("list_actors sql error", e))?;

    let payload: Vec<ActorResponse> = actors.into_iter().map(ActorResponse::from).collect();

    Ok(Json(payload))
}

// POST /api/actors
async fn create_actor(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate().map_err(|e| bad_request(&e.to_string()))?;

    let actor = sqlx::query_as::<_, Actor>(
        "INSERT INTO actors (first_name, surname) VALUES ($1, $2)
         RETURNING id, first_name, surname",
    )
    .bind(&req.first_name)
    .bind(&req.surname)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| internal_error("create_actor sql error", e))?;

    Ok((StatusCode::CREATED, Json(ActorResponse::from(actor))))
}

// GET /api/actors/{id}
async fn get_actor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let actor =
        sqlx::query_as::<_, Actor>("SELECT id, first_name, surname FROM actors WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.db.pool)
            .await
            .map_err(|e| internal_error("get_actor sql error", e))?
            .ok_or_else(|| not_found("actor not found"))?;

    Ok(Json(ActorResponse::from(actor)))
}

// PUT /api/actors/{id}
async fn update_actor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate().map_err(|e| bad_request(&e.to_string()))?;

    let actor = sqlx::query_as::<_, Actor>(
        "UPDATE actors SET first_name = $1, surname = $2 WHERE id = $3
         RETURNING id, first_name, surname",
    )
    .bind(&req.first_name)
    .bind(&req.surname)
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| internal_error("update_actor sql error", e))?
    .ok_or_else(|| not_found("actor not found"))?;

    Ok(Json(ActorResponse::from(actor)))
}

// DELETE /api/actors/{id}
async fn delete_actor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let result = sqlx::query("DELETE FROM actors WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map_err(|e| internal_error("delete_actor sql error", e))?;

    if result.rows_affected() == 0 {
        return Err(not_found("actor not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
