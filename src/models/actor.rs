use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub first_name: String,
    pub surname: String,
}

impl Actor {
    // Полное имя для списочных проекций
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.surname)
    }
}
