//! Repflow database layer
//!
//! Postgres repositories over a shared [`sqlx::PgPool`]. Temporal columns are
//! stored as `NUMERIC(10,3)` and surfaced to Rust as `f64` through explicit
//! casts in every query.

pub mod db;
pub mod schema;

pub use db::exercise::ExerciseRepository;
pub use db::job::JobRepository;
pub use db::routine::RoutineRepository;
pub use db::transaction::with_transaction;
pub use schema::init_schema;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use repflow_core::Config;

/// Build the shared connection pool. Idle connections are capped so the pool
/// survives transient server-side disconnects on long-lived deployments.
pub async fn connect_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .idle_timeout(Duration::from_secs(config.db_idle_timeout_secs))
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await
}
