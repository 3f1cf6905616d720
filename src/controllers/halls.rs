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

use crate::error::{
    bad_request, conflict, internal_error, is_foreign_key_violation, not_found, ApiResult,
};
use crate::models::CinemaHall;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cinema_halls", get(list_halls).post(create_hall))
        .route(
            "/cinema_halls/{id}",
            get(get_hall).put(update_hall).delete(delete_hall),
        )
}

// Размеры зала задают допустимые координаты мест, нули и минус тут запрещены
#[derive(Debug, Deserialize, Validate)]
struct HallRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1..=255 characters"))]
    name: String,
    #[validate(range(min = 1, message = "rows must be a positive integer"))]
    rows: i32,
    #[validate(range(min = 1, message = "seats_in_row must be a positive integer"))]
    seats_in_row: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct HallResponse {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) rows: i32,
    pub(crate) seats_in_row: i32,
    pub(crate) capacity: i64,
}

impl From<CinemaHall> for HallResponse {
    fn from(hall: CinemaHall) -> Self {
        let capacity = hall.capacity();
        Self {
            id: hall.id,
            name: hall.name,
            rows: hall.rows,
            seats_in_row: hall.seats_in_row,
            capacity,
        }
    }
}

// GET /api/cinema_halls
async fn list_halls(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let halls = sqlx::query_as::<_, CinemaHall>(
        "SELECT id, name, rows, seats_in_row FROM cinema_halls ORDER BY id",
    )
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| internal_error("list_halls sql error", e))?;

    let payload: Vec<HallResponse> = halls.into_iter().map(HallResponse::from).collect();

    Ok(Json(payload))
}

// POST /api/cinema_halls
async fn create_hall(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HallRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate().map_err(|e| bad_request(&e.to_string()))?;

    let hall = sqlx::query_as::<_, CinemaHall>(
        "INSERT INTO cinema_halls (name, rows, seats_in_row) VALUES ($1, $2, $3)
         RETURNING id, name, rows, seats_in_row",
    )
    .bind(&req.name)
    .bind(req.rows)
    .bind(req.seats_in_row)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| internal_error("create_hall sql error", e))?;

    Ok((StatusCode::CREATED, Json(HallResponse::from(hall))))
}

// GET /api/cinema_halls/{id}
async fn get_hall(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let hall = sqlx::query_as::<_, CinemaHall>(
        "SELECT id, name, rows, seats_in_row FROM cinema_halls WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| internal_error("get_hall sql error", e))?
    .ok_or_else(|| not_found("cinema hall not found"))?;

    Ok(Json(HallResponse::from(hall)))
}

// PUT /api/cinema_halls/{id}
async fn update_hall(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<HallRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate().map_err(|e| bad_request(&e.to_string()))?;

    let hall = sqlx::query_as::<_, CinemaHall>(
        "UPDATE cinema_halls SET name = $1, rows = $2, seats_in_row = $3 WHERE id = $4
         RETURNING id, name, rows, seats_in_row",
    )
    .bind(&req.name)
    .bind(req.rows)
    .bind(req.seats_in_row)
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| internal_error("update_hall sql error", e))?
    .ok_or_else(|| not_found("cinema hall not found"))?;

    Ok(Json(HallResponse::from(hall)))
}

// DELETE /api/cinema_halls/{id}
async fn delete_hall(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    // Каскад снесёт сеансы зала, но сеанс с билетами удалить нельзя
    let result = sqlx::query("DELETE FROM cinema_halls WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                conflict("cinema hall has sessions with sold tickets")
            } else {
                internal_error("delete_hall sql error", e)
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(not_found("cinema hall not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
