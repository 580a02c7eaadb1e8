//! Post-migration schema verification
//!
//! Individual statement errors are tolerated by the runner, so the true
//! success signal is whether the expected columns actually exist afterwards.
//! The verifier queries `information_schema.columns` and reports each expected
//! column's presence by name.

use tracing::{error, info};

use crate::db::DbPool;
use crate::utils::error::MigrateResult;

/// Presence report for a fixed set of expected columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub table: String,
    pub present: Vec<String>,
    pub missing: Vec<String>,
}

impl VerificationReport {
    /// Build a report from the expected column names and the names actually
    /// found in the catalog. Pure; the authoritative pass/fail decision is
    /// [`VerificationReport::passed`].
    pub fn check(table: &str, expected: &[&str], found: &[String]) -> Self {
        let mut present = Vec::new();
        let mut missing = Vec::new();
        for &column in expected {
            if found.iter().any(|f| f == column) {
                present.push(column.to_string());
            } else {
                missing.push(column.to_string());
            }
        }
        Self {
            table: table.to_string(),
            present,
            missing,
        }
    }

    /// True only when every expected column is present
    pub fn passed(&self) -> bool {
        self.missing.is_empty()
    }

    /// Log one line per expected column
    pub fn log(&self) {
        for column in &self.present {
            info!("column present: {}.{}", self.table, column);
        }
        for column in &self.missing {
            error!("column MISSING: {}.{}", self.table, column);
        }
    }
}

/// Fetch the column names of `table` from the catalog.
pub async fn fetch_columns(pool: &DbPool, table: &str) -> MigrateResult<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT column_name::text FROM information_schema.columns WHERE table_name = $1",
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// Verify that `expected` columns exist on `table`.
pub async fn verify_columns(
    pool: &DbPool,
    table: &str,
    expected: &[&str],
) -> MigrateResult<VerificationReport> {
    let found = fetch_columns(pool, table).await?;
    Ok(VerificationReport::check(table, expected, &found))
}
