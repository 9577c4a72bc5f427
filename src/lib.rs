//! Curator - authorization and integrity layer for a community product catalog.

pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod integrity;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod policy;
pub mod schema;
pub mod service;
pub mod store;
pub mod telemetry;

use diesel::r2d2::{self, ConnectionManager};
use diesel::PgConnection;
use std::time::Duration;

pub use auth::{Actor, Caller, Role};
pub use config::Config;
pub use error::{ServiceError, ServiceResult};
pub use service::Catalog;
pub use store::{MemoryStore, PgStore, Store};

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

pub fn create_db_pool(config: &config::Config) -> ServiceResult<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(&config.database.url);
    r2d2::Pool::builder()
        .max_size(config.database.max_connections)
        .min_idle(Some(config.database.min_connections))
        .connection_timeout(Duration::from_secs(config.database.connection_timeout_secs))
        .idle_timeout(Some(Duration::from_secs(config.database.idle_timeout_secs)))
        .build(manager)
        .map_err(|e| ServiceError::storage(format!("Failed to create database pool: {e}")))
}

pub fn create_db_pool_with_url(database_url: &str) -> ServiceResult<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(5)
        .min_idle(Some(1))
        .connection_timeout(Duration::from_secs(30))
        .build(manager)
        .map_err(|e| ServiceError::storage(format!("Failed to create database pool: {e}")))
}

pub fn init_tracing(config: &config::Config) {
    telemetry::init_telemetry(config);
}
