//! Migration services

pub mod psql;
pub mod runner;
pub mod sql;
pub mod verify;

pub use psql::{Elevation, InvocationResult, PsqlConfig, PsqlRunner};
pub use runner::{run_statements, OutcomeCounts, StatementOutcome, StatementRecord};
pub use sql::split_statements;
pub use verify::{verify_columns, VerificationReport};
