pub mod actors;
pub mod genres;
pub mod halls;
pub mod movies;
pub mod orders;
pub mod sessions;
pub mod users;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(genres::routes())
        .merge(actors::routes())
        .merge(halls::routes())
        .merge(movies::routes())
        .merge(sessions::routes())
        .merge(orders::routes())
        .merge(users::routes())
}
