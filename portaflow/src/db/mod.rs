//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL.
//! It follows the Repository pattern: handlers wrap a connection and expose
//! strongly-typed operations returning models from [`models`].
//!
//! Queries are built at runtime (`sqlx::query_as`/`query_scalar` with binds)
//! so the crate compiles without a live database.
//!
//! # Migrations
//!
//! Migrations live in the `migrations/` directory and are embedded at compile
//! time via [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;

use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

use crate::config::PoolSettings;

/// Build a connection pool from the configured settings.
pub async fn connect(url: &str, settings: &PoolSettings) -> Result<PgPool, sqlx::Error> {
    let mut options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs));

    if settings.idle_timeout_secs > 0 {
        options = options.idle_timeout(Duration::from_secs(settings.idle_timeout_secs));
    }
    if settings.max_lifetime_secs > 0 {
        options = options.max_lifetime(Duration::from_secs(settings.max_lifetime_secs));
    }

    options.connect(url).await
}
