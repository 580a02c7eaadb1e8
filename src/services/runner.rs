//! Per-statement migration execution
//!
//! Executes migration statements one at a time against a direct database
//! connection, never aborting the batch. Failures are classified: privilege
//! and duplicate-object errors are tolerated (the migration may have partially
//! run before), anything else is recorded as a genuine failure. The collected
//! records feed the operator report; the authoritative pass/fail signal comes
//! from schema verification, not from these outcomes.

use sqlx::Executor;
use tracing::{error, info, warn};

use crate::db::DbPool;

/// SQLSTATE for insufficient_privilege
const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// SQLSTATE codes for duplicate objects (column, object, function, database,
/// schema, table)
const DUPLICATE_SQLSTATES: &[&str] = &["42701", "42710", "42723", "42P04", "42P06", "42P07"];

/// Outcome of a single migration statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementOutcome {
    Succeeded,
    /// Insufficient privilege, tolerated
    SkippedPrivilege,
    /// Object already exists, tolerated
    SkippedDuplicate,
    /// Genuine failure; execution still continues
    Failed(String),
}

/// Record of one executed statement
#[derive(Debug, Clone)]
pub struct StatementRecord {
    /// First line of the statement, truncated for log output
    pub preview: String,
    pub outcome: StatementOutcome,
}

/// Aggregated outcome counts for the final report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub succeeded: usize,
    pub skipped_privilege: usize,
    pub skipped_duplicate: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    /// Tally a sequence of statement records
    pub fn tally(records: &[StatementRecord]) -> Self {
        let mut counts = Self::default();
        for record in records {
            match record.outcome {
                StatementOutcome::Succeeded => counts.succeeded += 1,
                StatementOutcome::SkippedPrivilege => counts.skipped_privilege += 1,
                StatementOutcome::SkippedDuplicate => counts.skipped_duplicate += 1,
                StatementOutcome::Failed(_) => counts.failed += 1,
            }
        }
        counts
    }
}

/// Classify a failed statement from its SQLSTATE and message.
///
/// Privilege and duplicate errors are tolerated so a migration can be re-run
/// against a partially migrated database. The message fallback catches driver
/// errors that carry no SQLSTATE.
pub fn classify_failure(sqlstate: Option<&str>, message: &str) -> StatementOutcome {
    if sqlstate == Some(INSUFFICIENT_PRIVILEGE) {
        return StatementOutcome::SkippedPrivilege;
    }
    if let Some(code) = sqlstate {
        if DUPLICATE_SQLSTATES.contains(&code) {
            return StatementOutcome::SkippedDuplicate;
        }
    }
    let lower = message.to_lowercase();
    if lower.contains("already exists") || lower.contains("duplicate") {
        return StatementOutcome::SkippedDuplicate;
    }
    StatementOutcome::Failed(message.to_string())
}

/// Truncated single-line preview of a statement for log output
pub fn preview(statement: &str) -> String {
    let flat: String = statement.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > 60 {
        let truncated: String = flat.chars().take(60).collect();
        format!("{truncated}...")
    } else {
        flat
    }
}

/// Execute statements in order, collecting an outcome per statement.
///
/// The batch never aborts: a genuine failure is recorded and execution moves
/// on to the next statement. Statements run outside any transaction, so each
/// one commits independently.
pub async fn run_statements(pool: &DbPool, statements: &[String]) -> Vec<StatementRecord> {
    let mut records = Vec::with_capacity(statements.len());

    for statement in statements {
        let preview = preview(statement);
        let outcome = match pool.execute(statement.as_str()).await {
            Ok(_) => {
                info!("statement succeeded: {preview}");
                StatementOutcome::Succeeded
            }
            Err(e) => {
                let outcome = match &e {
                    sqlx::Error::Database(db_err) => {
                        let code = db_err.code().map(|c| c.to_string());
                        classify_failure(code.as_deref(), db_err.message())
                    }
                    other => StatementOutcome::Failed(other.to_string()),
                };
                match &outcome {
                    StatementOutcome::SkippedPrivilege => {
                        warn!("insufficient privilege, skipping: {preview}");
                    }
                    StatementOutcome::SkippedDuplicate => {
                        info!("object already exists, skipping: {preview}");
                    }
                    StatementOutcome::Failed(msg) => {
                        error!("statement failed: {preview} - {msg}");
                    }
                    StatementOutcome::Succeeded => unreachable!(),
                }
                outcome
            }
        };
        records.push(StatementRecord { preview, outcome });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_privilege_error_is_skipped() {
        let outcome = classify_failure(Some("42501"), "permission denied for table cabinets");
        assert_eq!(outcome, StatementOutcome::SkippedPrivilege);
    }

    #[rstest]
    #[case("42701")]
    #[case("42710")]
    #[case("42723")]
    #[case("42P04")]
    #[case("42P06")]
    #[case("42P07")]
    fn test_duplicate_sqlstates_are_skipped(#[case] code: &str) {
        let outcome = classify_failure(Some(code), "relation \"cabinets\" already exists");
        assert_eq!(outcome, StatementOutcome::SkippedDuplicate);
    }

    #[rstest]
    #[case("column \"api_key\" of relation \"cabinets\" already exists")]
    #[case("Duplicate key value violates unique constraint")]
    fn test_duplicate_message_fallback(#[case] message: &str) {
        let outcome = classify_failure(None, message);
        assert_eq!(outcome, StatementOutcome::SkippedDuplicate);
    }

    #[test]
    fn test_other_errors_are_genuine_failures() {
        let outcome = classify_failure(Some("42601"), "syntax error at or near \"TALBE\"");
        assert_eq!(
            outcome,
            StatementOutcome::Failed("syntax error at or near \"TALBE\"".to_string())
        );
    }

    #[test]
    fn test_preview_flattens_and_truncates() {
        let stmt = "ALTER TABLE cabinets\n    ADD COLUMN activation_status VARCHAR(20) NOT NULL DEFAULT 'pending'";
        let p = preview(stmt);
        assert!(!p.contains('\n'));
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), 63);
    }

    #[test]
    fn test_tally() {
        let records = vec![
            StatementRecord {
                preview: "a".into(),
                outcome: StatementOutcome::Succeeded,
            },
            StatementRecord {
                preview: "b".into(),
                outcome: StatementOutcome::SkippedDuplicate,
            },
            StatementRecord {
                preview: "c".into(),
                outcome: StatementOutcome::Failed("boom".into()),
            },
            StatementRecord {
                preview: "d".into(),
                outcome: StatementOutcome::SkippedPrivilege,
            },
        ];
        let counts = OutcomeCounts::tally(&records);
        assert_eq!(counts.succeeded, 1);
        assert_eq!(counts.skipped_duplicate, 1);
        assert_eq!(counts.skipped_privilege, 1);
        assert_eq!(counts.failed, 1);
    }
}
