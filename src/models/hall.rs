use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Геометрия зала: rows x seats_in_row задает пространство допустимых мест
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CinemaHall {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
}

impl CinemaHall {
    pub fn capacity(&self) -> i64 {
        self.rows as i64 * self.seats_in_row as i64
    }
}
