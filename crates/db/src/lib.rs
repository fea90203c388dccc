//! Database layer with `SeaORM` entities and the approval store.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - [`SeaOrmApprovalStore`], the PostgreSQL implementation of the workflow store traits
//! - Database migrations

pub mod entities;
pub mod migration;
pub mod store;

pub use store::SeaOrmApprovalStore;

use std::time::Duration;

use outlay_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a pooled connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}
