use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use validator::Validate;

use crate::controllers::actors::ActorResponse;
use crate::error::{
    bad_request, conflict, internal_error, is_foreign_key_violation, not_found, ApiError,
    ApiResult,
};
use crate::models::{Actor, Genre, Movie};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route(
            "/movies/{id}",
            get(get_movie).put(update_movie).delete(delete_movie),
        )
}

#[derive(Debug, Deserialize, Validate)]
struct MovieRequest {
    #[validate(length(min = 1, max = 255, message = "title must be 1..=255 characters"))]
    title: String,
    description: String,
    #[validate(range(min = 1, message = "duration must be a positive number of minutes"))]
    duration: i32,
    #[serde(default)]
    genres: Vec<i64>,
    #[serde(default)]
    actors: Vec<i64>,
}

// Ответ на запись: связи идут списками id, как пришли
#[derive(Debug, Serialize)]
struct MovieWriteResponse {
    id: i64,
    title: String,
    description: String,
    duration: i32,
    genres: Vec<i64>,
    actors: Vec<i64>,
}

// Списковая проекция: жанры и актёры строками
#[derive(Debug, Serialize)]
pub(crate) struct MovieListResponse {
    pub(crate) id: i64,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) duration: i32,
    pub(crate) genres: Vec<String>,
    pub(crate) actors: Vec<String>,
}

// Детальная проекция: вложенные объекты
#[derive(Debug, Serialize)]
struct MovieDetailResponse {
    id: i64,
    title: String,
    description: String,
    duration: i32,
    genres: Vec<Genre>,
    actors: Vec<ActorResponse>,
}

/// Списковая форма одного фильма, нужна и детальной проекции сеанса.
pub(crate) async fn movie_list_item(
    pool: &sqlx::PgPool,
    movie_id: i64,
) -> sqlx::Result<MovieListResponse> {
    let movie: Movie =
        sqlx::query_as("SELECT id, title, description, duration FROM movies WHERE id = $1")
            .bind(movie_id)
            .fetch_one(pool)
            .await?;

    let genres: Vec<String> = sqlx::query_scalar(
        "SELECT g.name FROM movie_genres mg
         JOIN genres g ON g.id = mg.genre_id
         WHERE mg.movie_id = $1
         ORDER BY g.id",
    )
    .bind(movie_id)
    .fetch_all(pool)
    .await?;

    let actor_names: Vec<(String, String)> = sqlx::query_as(
        "SELECT a.first_name, a.surname FROM movie_actors ma
         JOIN actors a ON a.id = ma.actor_id
         WHERE ma.movie_id = $1
         ORDER BY a.id",
    )
    .bind(movie_id)
    .fetch_all(pool)
    .await?;

    Ok(MovieListResponse {
        id: movie.id,
        title: movie.title,
        description: movie.description,
        duration: movie.duration,
        genres,
        actors: actor_names
            .into_iter()
            .map(|(first_name, surname)| format!("{} {}", first_name, surname))
            .collect(),
    })
}

/// Перепривязывает M2M-связи фильма внутри открытой транзакции.
async fn replace_movie_links(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    movie_id: i64,
    req: &MovieRequest,
) -> Result<(), (StatusCode, Json<ApiError>)> {
    sqlx::query("DELETE FROM movie_genres WHERE movie_id = $1")
        .bind(movie_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| internal_error("replace_movie_links sql error", e))?;

    sqlx::query("DELETE FROM movie_actors WHERE movie_id = $1")
        .bind(movie_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| internal_error("replace_movie_links sql error", e))?;

    for &genre_id in &req.genres {
        sqlx::query(
            "INSERT INTO movie_genres (movie_id, genre_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(movie_id)
        .bind(genre_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                bad_request(&format!("genre {} does not exist", genre_id))
            } else {
                internal_error("replace_movie_links sql error", e)
            }
        })?;
    }

    for &actor_id in &req.actors {
        sqlx::query(
            "INSERT INTO movie_actors (movie_id, actor_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(movie_id)
        .bind(actor_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                bad_request(&format!("actor {} does not exist", actor_id))
            } else {
                internal_error("replace_movie_links sql error", e)
            }
        })?;
    }

    Ok(())
}

// GET /api/movies
async fn list_movies(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let movies =
        sqlx::query_as::<_, Movie>("SELECT id, title, description, duration FROM movies ORDER BY id")
            .fetch_all(&state.db.pool)
            .await
            .map_err(|e| internal_error("list_movies sql error", e))?;

    let genre_rows: Vec<(i64, String)> = sqlx::query_as(
        "SELECT mg.movie_id, g.name FROM movie_genres mg
         JOIN genres g ON g.id = mg.genre_id
         ORDER BY mg.movie_id, g.id",
    )
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| internal_error("list_movies sql error", e))?;

    let actor_rows: Vec<(i64, String, String)> = sqlx::query_as(
        "SELECT ma.movie_id, a.first_name, a.surname FROM movie_actors ma
         JOIN actors a ON a.id = ma.actor_id
         ORDER BY ma.movie_id, a.id",
    )
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| internal_error("list_movies sql error", e))?;

    let mut genres_by_movie: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for (movie_id, name) in genre_rows {
        genres_by_movie.entry(movie_id).or_default().push(name);
    }

    let mut actors_by_movie: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for (movie_id, first_name, surname) in actor_rows {
        actors_by_movie
            .entry(movie_id)
            .or_default()
            .push(format!("{} {}", first_name, surname));
    }

    let payload: Vec<MovieListResponse> = movies
        .into_iter()
        .map(|m| MovieListResponse {
            genres: genres_by_movie.remove(&m.id).unwrap_or_default(),
            actors: actors_by_movie.remove(&m.id).unwrap_or_default(),
            id: m.id,
            title: m.title,
            description: m.description,
            duration: m.duration,
        })
        .collect();

    Ok(Json(payload))
}

// POST /api/movies
async fn create_movie(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MovieRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate().map_err(|e| bad_request(&e.to_string()))?;

    let mut tx = state
        .db
        .pool
        .begin()
        .await
        .map_err(|e| internal_error("create_movie tx error", e))?;

    let movie: Movie = sqlx::query_as(
        "INSERT INTO movies (title, description, duration) VALUES ($1, $2, $3)
         RETURNING id, title, description, duration",
    )
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.duration)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| internal_error("create_movie sql error", e))?;

    replace_movie_links(&mut tx, movie.id, &req).await?;

    tx.commit()
        .await
        .map_err(|e| internal_error("create_movie commit error", e))?;

    Ok((
        StatusCode::CREATED,
        Json(MovieWriteResponse {
            id: movie.id,
            title: movie.title,
            description: movie.description,
            duration: movie.duration,
            genres: req.genres,
            actors: req.actors,
        }),
    ))
}

// GET /api/movies/{id}
async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let movie =
        sqlx::query_as::<_, Movie>("SELECT id, title, description, duration FROM movies WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.db.pool)
            .await
            .map_err(|e| internal_error("get_movie sql error", e))?
            .ok_or_else(|| not_found("movie not found"))?;

    let genres = sqlx::query_as::<_, Genre>(
        "SELECT g.id, g.name FROM movie_genres mg
         JOIN genres g ON g.id = mg.genre_id
         WHERE mg.movie_id = $1
         ORDER BY g.id",
    )
    .bind(id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| internal_error("get_movie sql error", e))?;

    let actors = sqlx::query_as::<_, Actor>(
        "SELECT a.id, a.first_name, a.surname FROM movie_actors ma
         JOIN actors a ON a.id = ma.actor_id
         WHERE ma.movie_id = $1
         ORDER BY a.id",
    )
    .bind(id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| internal_error("get_movie sql error", e))?;

    Ok(Json(MovieDetailResponse {
        id: movie.id,
        title: movie.title,
        description: movie.description,
        duration: movie.duration,
        genres,
        actors: actors.into_iter().map(ActorResponse::from).collect(),
    }))
}

// PUT /api/movies/{id}
async fn update_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<MovieRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate().map_err(|e| bad_request(&e.to_string()))?;

    let mut tx = state
        .db
        .pool
        .begin()
        .await
        .map_err(|e| internal_error("update_movie tx error", e))?;

    let movie: Movie = sqlx::query_as(
        "UPDATE movies SET title = $1, description = $2, duration = $3 WHERE id = $4
         RETURNING id, title, description, duration",
    )
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.duration)
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| internal_error("update_movie sql error", e))?
    .ok_or_else(|| not_found("movie not found"))?;

    replace_movie_links(&mut tx, movie.id, &req).await?;

    tx.commit()
        .await
        .map_err(|e| internal_error("update_movie commit error", e))?;

    Ok(Json(MovieWriteResponse {
        id: movie.id,
        title: movie.title,
        description: movie.description,
        duration: movie.duration,
        genres: req.genres,
        actors: req.actors,
    }))
}

// DELETE /api/movies/{id}
async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    // Каскад снесёт сеансы фильма, но сеанс с билетами удалить нельзя
    let result = sqlx::query("DELETE FROM movies WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                conflict("movie has sessions with sold tickets")
            } else {
                internal_error("delete_movie sql error", e)
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(not_found("movie not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
