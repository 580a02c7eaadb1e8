//! Database layer
//!
//! Connection handling for the direct-driver migration runner. Statements are
//! executed outside any transaction, so each one commits independently
//! (autocommit), matching the best-effort re-run policy of the runner.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};

use crate::config::ConnectionParams;
use crate::utils::error::MigrateResult;

/// Database connection pool type
pub type DbPool = Pool<Postgres>;

/// Open a connection to the target database.
///
/// A single connection is enough: the runner is a sequential, exclusive
/// writer and each invocation is a fresh attempt.
pub async fn connect(params: &ConnectionParams) -> MigrateResult<DbPool> {
    let options = PgConnectOptions::new()
        .host(&params.host)
        .port(params.port)
        .username(&params.user)
        .password(&params.password)
        .database(&params.dbname);

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}
