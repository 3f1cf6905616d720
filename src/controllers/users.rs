use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{bad_request, conflict, internal_error, is_unique_violation, ApiResult};
use crate::middleware::AuthUser;
use crate::models::User;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/me", get(me))
}

#[derive(Debug, Deserialize, Validate)]
struct RegisterRequest {
    #[validate(email(message = "email must be a valid address"))]
    email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    password: String,
    #[validate(length(min = 1, max = 255, message = "first_name must be 1..=255 characters"))]
    first_name: String,
    #[validate(length(min = 1, max = 255, message = "surname must be 1..=255 characters"))]
    surname: String,
}

#[derive(Debug, Serialize)]
struct UserResponse {
    user_id: i32,
    email: String,
    first_name: String,
    surname: String,
}

// POST /api/users/register
async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate().map_err(|e| bad_request(&e.to_string()))?;

    // bcrypt с настроенной стоимостью, вне async-потока
    let cost = state.config.auth.bcrypt_cost;
    let password = req.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| internal_error("register hash task error", e))?
        .map_err(|e| internal_error("register hash error", e))?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (email, password_hash, first_name, surname)
         VALUES ($1, $2, $3, $4)
         RETURNING *",
    )
    .bind(&req.email)
    .bind(&password_hash)
    .bind(&req.first_name)
    .bind(&req.surname)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            conflict("user with this email already exists")
        } else {
            internal_error("register sql error", e)
        }
    })?;

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            user_id: user.user_id,
            email: user.email,
            first_name: user.first_name,
            surname: user.surname,
        }),
    ))
}

// GET /api/users/me
async fn me(user: AuthUser) -> Json<UserResponse> {
    Json(UserResponse {
        user_id: user.user_id,
        email: user.email,
        first_name: user.first_name,
        surname: user.surname,
    })
}
