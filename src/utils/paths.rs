//! Migration file resolution

use std::path::{Path, PathBuf};

use crate::utils::error::{MigrateError, MigrateResult};

/// Resolve the migration file for a run, checking existence up front.
///
/// An explicit path is used verbatim; otherwise the default file is looked up
/// relative to the project root. The file must exist before any database
/// connection or client process is started, so a missing file aborts the run
/// here.
pub fn resolve_migration_file(
    root: &Path,
    explicit: Option<PathBuf>,
    default_relative: &str,
) -> MigrateResult<PathBuf> {
    let path = explicit.unwrap_or_else(|| root.join(default_relative));
    if path.exists() {
        Ok(path)
    } else {
        Err(MigrateError::MigrationFileNotFound(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DEFAULT: &str = "migrations/006_add_cabinet_activation_fields.sql";

    #[test]
    fn test_missing_default_file_is_an_error() {
        let root = TempDir::new().unwrap();
        match resolve_migration_file(root.path(), None, DEFAULT).unwrap_err() {
            MigrateError::MigrationFileNotFound(path) => {
                assert_eq!(path, root.path().join(DEFAULT));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_existing_default_file_resolves() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("migrations");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(
            dir.join("006_add_cabinet_activation_fields.sql"),
            "SELECT 1;",
        )
        .unwrap();

        let path = resolve_migration_file(root.path(), None, DEFAULT).unwrap();
        assert_eq!(path, root.path().join(DEFAULT));
    }

    #[test]
    fn test_explicit_override_wins_over_default() {
        let root = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let explicit = other.path().join("custom.sql");
        std::fs::write(&explicit, "SELECT 1;").unwrap();

        let path =
            resolve_migration_file(root.path(), Some(explicit.clone()), DEFAULT).unwrap();
        assert_eq!(path, explicit);
    }

    #[test]
    fn test_missing_explicit_override_reports_that_path() {
        let root = TempDir::new().unwrap();
        let explicit = PathBuf::from("/nonexistent/custom.sql");
        match resolve_migration_file(root.path(), Some(explicit.clone()), DEFAULT).unwrap_err() {
            MigrateError::MigrationFileNotFound(path) => assert_eq!(path, explicit),
            other => panic!("unexpected error: {other}"),
        }
    }
}
