pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod controllers;
pub mod middleware;
pub mod services;

use std::sync::Arc;

use services::{BookingService, PgBookingStore};

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub config: config::Config,
    pub booking: BookingService,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database).await?;

        db.run_migrations().await?;

        let booking = BookingService::new(Arc::new(PgBookingStore::new(db.pool.clone())));

        Ok(Arc::new(Self {
            db,
            config,
            booking,
        }))
    }
}
