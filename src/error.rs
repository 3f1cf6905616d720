use axum::{http::StatusCode, Json};
use serde::Serialize;

// Единый формат тела ошибки для всех HTTP-ответов
#[derive(Debug, Serialize)]
pub struct ApiError {
    success: bool,
    message: String,
}

pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub fn to_api_error(status: StatusCode, message: &str) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError { success: false, message: message.to_string() }))
}

pub fn bad_request(message: &str) -> (StatusCode, Json<ApiError>) {
    to_api_error(StatusCode::BAD_REQUEST, message)
}

pub fn not_found(message: &str) -> (StatusCode, Json<ApiError>) {
    to_api_error(StatusCode::NOT_FOUND, message)
}

pub fn conflict(message: &str) -> (StatusCode, Json<ApiError>) {
    to_api_error(StatusCode::CONFLICT, message)
}

// Инфраструктурные сбои наружу не детализируем - только в лог
pub fn internal_error<E: std::fmt::Debug>(context: &str, err: E) -> (StatusCode, Json<ApiError>) {
    tracing::error!("{}: {:?}", context, err);
    to_api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}
