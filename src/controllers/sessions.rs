use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::controllers::halls::HallResponse;
use crate::controllers::movies::{movie_list_item, MovieListResponse};
use crate::error::{
    bad_request, conflict, internal_error, is_foreign_key_violation, not_found, ApiError,
    ApiResult,
};
use crate::models::{CinemaHall, MovieSession};
use crate::services::{HallLayout, Place};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movie_sessions", get(list_sessions).post(create_session))
        .route(
            "/movie_sessions/{id}",
            get(get_session).put(update_session).delete(delete_session),
        )
}

// В теле записи фильм и зал приходят как id
#[derive(Debug, Deserialize)]
struct SessionRequest {
    show_time: NaiveDateTime,
    movie: i64,
    cinema_hall: i64,
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    id: i64,
    show_time: NaiveDateTime,
    movie: i64,
    cinema_hall: i64,
}

impl From<MovieSession> for SessionResponse {
    fn from(session: MovieSession) -> Self {
        Self {
            id: session.id,
            show_time: session.show_time,
            movie: session.movie_id,
            cinema_hall: session.cinema_hall_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SessionListRow {
    pub(crate) id: i64,
    pub(crate) show_time: NaiveDateTime,
    pub(crate) movie_title: String,
    pub(crate) cinema_hall_name: String,
    pub(crate) rows: i32,
    pub(crate) seats_in_row: i32,
    pub(crate) tickets_sold: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionListItem {
    id: i64,
    show_time: NaiveDateTime,
    movie_title: String,
    cinema_hall_name: String,
    cinema_hall_capacity: i64,
    tickets_available: i64,
}

impl SessionListItem {
    // Свободные места пересчитываются от вместимости зала на каждое чтение
    pub(crate) fn project(row: SessionListRow) -> Self {
        let capacity = HallLayout {
            rows: row.rows,
            seats_in_row: row.seats_in_row,
        }
        .capacity();

        Self {
            id: row.id,
            show_time: row.show_time,
            movie_title: row.movie_title,
            cinema_hall_name: row.cinema_hall_name,
            cinema_hall_capacity: capacity,
            tickets_available: capacity - row.tickets_sold,
        }
    }
}

#[derive(Debug, Serialize)]
struct SessionDetailResponse {
    id: i64,
    show_time: NaiveDateTime,
    movie: MovieListResponse,
    cinema_hall: HallResponse,
    taken_places: Vec<Place>,
    tickets_available: i64,
}

async fn ensure_refs_exist(
    pool: &sqlx::PgPool,
    req: &SessionRequest,
) -> Result<(), (StatusCode, Json<ApiError>)> {
    let movie_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM movies WHERE id = $1)")
            .bind(req.movie)
            .fetch_one(pool)
            .await
            .map_err(|e| internal_error("session refs sql error", e))?;

    if !movie_exists {
        return Err(bad_request(&format!("movie {} does not exist", req.movie)));
    }

    let hall_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM cinema_halls WHERE id = $1)")
            .bind(req.cinema_hall)
            .fetch_one(pool)
            .await
            .map_err(|e| internal_error("session refs sql error", e))?;

    if !hall_exists {
        return Err(bad_request(&format!(
            "cinema hall {} does not exist",
            req.cinema_hall
        )));
    }

    Ok(())
}

// GET /api/movie_sessions
async fn list_sessions(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let rows = sqlx::query_as::<_, SessionListRow>(
        r#"
        SELECT ms.id, ms.show_time,
               m.title AS movie_title,
               h.name AS cinema_hall_name,
               h.rows, h.seats_in_row,
               (SELECT COUNT(*) FROM tickets t WHERE t.movie_session_id = ms.id) AS tickets_sold
        FROM movie_sessions ms
        JOIN movies m ON m.id = ms.movie_id
        JOIN cinema_halls h ON h.id = ms.cinema_hall_id
        ORDER BY ms.show_time, ms.id
        "#,
    )
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| internal_error("list_sessions sql error", e))?;

    let payload: Vec<SessionListItem> = rows.into_iter().map(SessionListItem::project).collect();

    Ok(Json(payload))
}

// POST /api/movie_sessions
async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionRequest>,
) -> ApiResult<impl IntoResponse> {
    ensure_refs_exist(&state.db.pool, &req).await?;

    let session: MovieSession = sqlx::query_as(
        "INSERT INTO movie_sessions (show_time, movie_id, cinema_hall_id) VALUES ($1, $2, $3)
         RETURNING id, show_time, movie_id, cinema_hall_id",
    )
    .bind(req.show_time)
    .bind(req.movie)
    .bind(req.cinema_hall)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        // Гонка с удалением фильма или зала после предварительной проверки
        if is_foreign_key_violation(&e) {
            bad_request("movie or cinema hall does not exist")
        } else {
            internal_error("create_session sql error", e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

// GET /api/movie_sessions/{id}
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let session = sqlx::query_as::<_, MovieSession>(
        "SELECT id, show_time, movie_id, cinema_hall_id FROM movie_sessions WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| internal_error("get_session sql error", e))?
    .ok_or_else(|| not_found("movie session not found"))?;

    let movie = movie_list_item(&state.db.pool, session.movie_id)
        .await
        .map_err(|e| internal_error("get_session sql error", e))?;

    let hall = sqlx::query_as::<_, CinemaHall>(
        "SELECT id, name, rows, seats_in_row FROM cinema_halls WHERE id = $1",
    )
    .bind(session.cinema_hall_id)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| internal_error("get_session sql error", e))?;

    let taken_places = state
        .booking
        .store()
        .taken_places(id)
        .await
        .map_err(|e| internal_error("get_session store error", e))?;

    let sold = state
        .booking
        .store()
        .tickets_sold(id)
        .await
        .map_err(|e| internal_error("get_session store error", e))?;

    let capacity = hall.capacity();

    Ok(Json(SessionDetailResponse {
        id: session.id,
        show_time: session.show_time,
        movie,
        cinema_hall: HallResponse::from(hall),
        taken_places,
        tickets_available: capacity - sold,
    }))
}

// PUT /api/movie_sessions/{id}
async fn update_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<SessionRequest>,
) -> ApiResult<impl IntoResponse> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM movie_sessions WHERE id = $1)")
            .bind(id)
            .fetch_one(&state.db.pool)
            .await
            .map_err(|e| internal_error("update_session sql error", e))?;

    if !exists {
        return Err(not_found("movie session not found"));
    }

    // Сеанс с проданными билетами не переносится и не пересаживается
    let sold = state
        .booking
        .store()
        .tickets_sold(id)
        .await
        .map_err(|e| internal_error("update_session store error", e))?;

    if sold > 0 {
        return Err(conflict("movie session already has sold tickets"));
    }

    ensure_refs_exist(&state.db.pool, &req).await?;

    let session: MovieSession = sqlx::query_as(
        "UPDATE movie_sessions SET show_time = $1, movie_id = $2, cinema_hall_id = $3
         WHERE id = $4
         RETURNING id, show_time, movie_id, cinema_hall_id",
    )
    .bind(req.show_time)
    .bind(req.movie)
    .bind(req.cinema_hall)
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            bad_request("movie or cinema hall does not exist")
        } else {
            internal_error("update_session sql error", e)
        }
    })?
    .ok_or_else(|| not_found("movie session not found"))?;

    Ok(Json(SessionResponse::from(session)))
}

// DELETE /api/movie_sessions/{id}
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let sold = state
        .booking
        .store()
        .tickets_sold(id)
        .await
        .map_err(|e| internal_error("delete_session store error", e))?;

    if sold > 0 {
        return Err(conflict("movie session has sold tickets"));
    }

    let result = sqlx::query("DELETE FROM movie_sessions WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map_err(|e| {
            // Билет могли купить между проверкой и удалением
            if is_foreign_key_violation(&e) {
                conflict("movie session has sold tickets")
            } else {
                internal_error("delete_session sql error", e)
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(not_found("movie session not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_row(tickets_sold: i64) -> SessionListRow {
        SessionListRow {
            id: 1,
            show_time: NaiveDate::from_ymd_opt(2024, 6, 2)
                .unwrap()
                .and_hms_opt(14, 0, 0)
                .unwrap(),
            movie_title: "Inception".to_string(),
            cinema_hall_name: "Blue".to_string(),
            rows: 10,
            seats_in_row: 10,
            tickets_sold,
        }
    }

    #[test]
    fn list_projection_derives_available_from_capacity() {
        let item = SessionListItem::project(sample_row(37));
        assert_eq!(item.cinema_hall_capacity, 100);
        assert_eq!(item.tickets_available, 63);
    }

    #[test]
    fn list_projection_is_stable_for_same_inputs() {
        let first = SessionListItem::project(sample_row(37));
        let second = SessionListItem::project(sample_row(37));
        assert_eq!(first.tickets_available, second.tickets_available);
    }

    #[test]
    fn sold_out_session_has_zero_available() {
        let item = SessionListItem::project(sample_row(100));
        assert_eq!(item.tickets_available, 0);
    }

    #[test]
    fn list_projection_serializes_expected_fields() {
        let json = serde_json::to_value(SessionListItem::project(sample_row(37))).unwrap();
        assert_eq!(json["movie_title"], "Inception");
        assert_eq!(json["cinema_hall_capacity"], 100);
        assert_eq!(json["tickets_available"], 63);
    }

    #[test]
    fn list_projection_is_exact_past_i32_capacity() {
        let mut row = sample_row(37);
        row.rows = 46_341;
        row.seats_in_row = 46_341;

        let item = SessionListItem::project(row);
        assert_eq!(item.cinema_hall_capacity, 2_147_488_281);
        assert_eq!(item.tickets_available, 2_147_488_244);
    }
}
