use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
}

// Билет никогда не меняется после создания и исчезает только вместе с заказом
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Ticket {
    pub id: i64,
    pub order_id: i64,
    pub movie_session_id: i64,
    pub row: i32,
    pub seat: i32,
}
