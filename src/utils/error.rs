//! Error types and handling
//!
//! Failure taxonomy for the migration tools. Configuration and file-existence
//! errors abort a run immediately; statement-level database errors are
//! classified and tolerated by the runner and never surface through this type.

use std::path::PathBuf;

use thiserror::Error;

/// Migration tool error types
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Configuration file could not be found
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// Configuration file exists but is not valid YAML
    #[error("Failed to parse configuration file {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_norway::Error,
    },

    /// Configuration parsed but contains invalid values
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Migration SQL file is missing
    #[error("Migration file not found: {}", .0.display())]
    MigrationFileNotFound(PathBuf),

    /// Database connection or query error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The external SQL client could not be invoked
    #[error("Failed to invoke SQL client: {0}")]
    ClientInvocation(String),

    /// Elevated execution requested without a credential in the environment
    #[error("SUDO_PASSWORD must be set when database.migration.use_sudo is enabled")]
    ElevationCredentialMissing,

    /// Expected columns were absent after the migration ran
    #[error("Schema verification failed: missing columns {0:?}")]
    VerificationFailed(Vec<String>),

    /// I/O error reading configuration or migration files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the migration tools
pub type MigrateResult<T> = Result<T, MigrateError>;
