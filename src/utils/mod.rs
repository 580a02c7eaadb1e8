//! Shared utilities

pub mod error;
pub mod paths;

pub use error::{MigrateError, MigrateResult};
pub use paths::resolve_migration_file;
