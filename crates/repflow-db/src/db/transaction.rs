//! Database transaction helper.
//!
//! Runs a closure inside a transaction, committing on success and rolling
//! back on error, so multi-statement writes never leave partial rows.

use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres, Transaction};

pub async fn with_transaction<F, R, E>(pool: &PgPool, f: F) -> Result<R>
where
    F: for<'a> FnOnce(
        &'a mut Transaction<'_, Postgres>,
    )
        -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<R, E>> + Send + 'a>>,
    E: Into<anyhow::Error> + Send + Sync + 'static,
{
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    match f(&mut tx).await {
        Ok(result) => {
            tx.commit().await.context("Failed to commit transaction")?;
            Ok(result)
        }
        Err(e) => {
            tx.rollback().await.ok();
            Err(e.into())
        }
    }
}
