//! Configuration management
//!
//! YAML-based configuration for the migration tools with support for:
//! - Environment variable overrides
//! - A migration-specific credential section overriding the general one
//! - Default values for all settings
//!
//! Connection parameter precedence, highest first:
//! environment variable > `database.migration` override > `database.postgres`
//! section > built-in default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::{MigrateError, MigrateResult};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration, general section plus optional migration override
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub postgres: PostgresConfig,
    /// Migration-specific credentials. When present, `user` and `password`
    /// override the general section; `host`, `port` and `dbname` always come
    /// from the general section.
    #[serde(default)]
    pub migration: Option<MigrationConfig>,
}

/// General PostgreSQL connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_dbname")]
    pub dbname: String,
}

/// Migration-specific overrides for the general section
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MigrationConfig {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Run the SQL client under the postgres OS identity via sudo
    #[serde(default)]
    pub use_sudo: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "cloud_user".to_string()
}

fn default_dbname() -> String {
    "cloud_system".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: String::new(),
            dbname: default_dbname(),
        }
    }
}

impl AppConfig {
    /// Load configuration for a project rooted at `root`.
    ///
    /// When `explicit` is given it is used verbatim; otherwise the file is
    /// `<root>/config.yaml`. A missing or malformed file is a hard error,
    /// no partial execution follows.
    pub fn load(root: &Path, explicit: Option<&Path>) -> MigrateResult<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => root.join("config.yaml"),
        };

        if !path.exists() {
            return Err(MigrateError::ConfigNotFound(path));
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: AppConfig = serde_norway::from_str(&contents)
            .map_err(|source| MigrateError::ConfigParse { path, source })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> MigrateResult<()> {
        let pg = &self.database.postgres;
        if pg.port == 0 {
            return Err(MigrateError::InvalidConfig(
                "database.postgres.port cannot be 0".to_string(),
            ));
        }
        if pg.user.is_empty() {
            return Err(MigrateError::InvalidConfig(
                "database.postgres.user cannot be empty".to_string(),
            ));
        }
        if pg.dbname.is_empty() {
            return Err(MigrateError::InvalidConfig(
                "database.postgres.dbname cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the migration section requests elevated execution
    pub fn use_sudo(&self) -> bool {
        self.database
            .migration
            .as_ref()
            .map(|m| m.use_sudo)
            .unwrap_or(false)
    }
}

/// Environment variable overrides for connection parameters
///
/// Captured once from the process environment and passed into
/// [`ConnectionParams::resolve`], so precedence stays a pure function.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub host: Option<String>,
    pub port: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub dbname: Option<String>,
}

impl EnvOverrides {
    /// Read `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD` and `DB_NAME`
    /// from the process environment.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("DB_HOST").ok(),
            port: std::env::var("DB_PORT").ok(),
            user: std::env::var("DB_USER").ok(),
            password: std::env::var("DB_PASSWORD").ok(),
            dbname: std::env::var("DB_NAME").ok(),
        }
    }
}

/// Fully resolved connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl ConnectionParams {
    /// Resolve final connection parameters from configuration and environment.
    ///
    /// The migration section's `user`/`password` override the general section
    /// field by field; `host`/`port`/`dbname` always come from the general
    /// section. Environment variables take highest precedence for all five
    /// parameters.
    pub fn resolve(database: &DatabaseConfig, env: &EnvOverrides) -> MigrateResult<Self> {
        let pg = &database.postgres;
        let migration = database.migration.as_ref();

        let user = env
            .user
            .clone()
            .or_else(|| migration.and_then(|m| m.user.clone()))
            .unwrap_or_else(|| pg.user.clone());
        let password = env
            .password
            .clone()
            .or_else(|| migration.and_then(|m| m.password.clone()))
            .unwrap_or_else(|| pg.password.clone());

        let host = env.host.clone().unwrap_or_else(|| pg.host.clone());
        let dbname = env.dbname.clone().unwrap_or_else(|| pg.dbname.clone());
        let port = match &env.port {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                MigrateError::InvalidConfig(format!("DB_PORT is not a valid port: {raw:?}"))
            })?,
            None => pg.port,
        };

        if port == 0 {
            return Err(MigrateError::InvalidConfig(
                "resolved port cannot be 0".to_string(),
            ));
        }
        if user.is_empty() {
            return Err(MigrateError::InvalidConfig(
                "resolved user cannot be empty".to_string(),
            ));
        }
        if dbname.is_empty() {
            return Err(MigrateError::InvalidConfig(
                "resolved dbname cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            host,
            port,
            user,
            password,
            dbname,
        })
    }

    /// Target description for log lines, password never included
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}", self.dbname, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn general() -> DatabaseConfig {
        DatabaseConfig {
            postgres: PostgresConfig {
                host: "db.internal".to_string(),
                port: 5433,
                user: "cloud_user".to_string(),
                password: "general-secret".to_string(),
                dbname: "cloud_system".to_string(),
            },
            migration: None,
        }
    }

    #[test]
    fn test_resolve_uses_general_section() {
        let params = ConnectionParams::resolve(&general(), &EnvOverrides::default()).unwrap();
        assert_eq!(params.host, "db.internal");
        assert_eq!(params.port, 5433);
        assert_eq!(params.user, "cloud_user");
        assert_eq!(params.password, "general-secret");
        assert_eq!(params.dbname, "cloud_system");
    }

    #[test]
    fn test_migration_override_is_field_by_field() {
        let mut database = general();
        database.migration = Some(MigrationConfig {
            user: Some("migrator".to_string()),
            password: None,
            use_sudo: false,
        });

        let params = ConnectionParams::resolve(&database, &EnvOverrides::default()).unwrap();
        assert_eq!(params.user, "migrator");
        // Everything else still comes from the general section
        assert_eq!(params.password, "general-secret");
        assert_eq!(params.host, "db.internal");
        assert_eq!(params.port, 5433);
        assert_eq!(params.dbname, "cloud_system");
    }

    #[test]
    fn test_env_overrides_beat_everything() {
        let mut database = general();
        database.migration = Some(MigrationConfig {
            user: Some("migrator".to_string()),
            password: Some("migrator-secret".to_string()),
            use_sudo: false,
        });

        let env = EnvOverrides {
            host: Some("10.0.0.9".to_string()),
            port: Some("6432".to_string()),
            user: Some("ops".to_string()),
            password: Some("env-secret".to_string()),
            dbname: Some("cloud_staging".to_string()),
        };

        let params = ConnectionParams::resolve(&database, &env).unwrap();
        assert_eq!(params.host, "10.0.0.9");
        assert_eq!(params.port, 6432);
        assert_eq!(params.user, "ops");
        assert_eq!(params.password, "env-secret");
        assert_eq!(params.dbname, "cloud_staging");
    }

    #[test]
    fn test_empty_migration_user_is_rejected() {
        let mut database = general();
        database.migration = Some(MigrationConfig {
            user: Some(String::new()),
            password: None,
            use_sudo: false,
        });
        let err = ConnectionParams::resolve(&database, &EnvOverrides::default()).unwrap_err();
        assert!(matches!(err, MigrateError::InvalidConfig(_)));
    }

    #[test]
    fn test_empty_env_user_is_rejected() {
        let env = EnvOverrides {
            user: Some(String::new()),
            ..EnvOverrides::default()
        };
        let err = ConnectionParams::resolve(&general(), &env).unwrap_err();
        assert!(matches!(err, MigrateError::InvalidConfig(_)));
    }

    #[test]
    fn test_empty_env_dbname_is_rejected() {
        let env = EnvOverrides {
            dbname: Some(String::new()),
            ..EnvOverrides::default()
        };
        let err = ConnectionParams::resolve(&general(), &env).unwrap_err();
        assert!(matches!(err, MigrateError::InvalidConfig(_)));
    }

    #[test]
    fn test_invalid_env_port_is_rejected() {
        let env = EnvOverrides {
            port: Some("not-a-port".to_string()),
            ..EnvOverrides::default()
        };
        let err = ConnectionParams::resolve(&general(), &env).unwrap_err();
        assert!(matches!(err, MigrateError::InvalidConfig(_)));
    }

    #[test]
    fn test_display_target_omits_credentials() {
        let params = ConnectionParams::resolve(&general(), &EnvOverrides::default()).unwrap();
        let target = params.display_target();
        assert_eq!(target, "cloud_system@db.internal:5433");
        assert!(!target.contains("general-secret"));
    }

    #[test]
    fn test_parse_defaults_for_missing_fields() {
        let config: AppConfig = serde_norway::from_str(
            r#"
database:
  postgres:
    password: secret
"#,
        )
        .unwrap();

        let pg = &config.database.postgres;
        assert_eq!(pg.host, "localhost");
        assert_eq!(pg.port, 5432);
        assert_eq!(pg.user, "cloud_user");
        assert_eq!(pg.dbname, "cloud_system");
        assert!(config.database.migration.is_none());
        assert!(!config.use_sudo());
    }

    #[test]
    fn test_parse_migration_section() {
        let config: AppConfig = serde_norway::from_str(
            r#"
database:
  postgres:
    host: db.internal
  migration:
    user: postgres
    use_sudo: true
"#,
        )
        .unwrap();

        assert!(config.use_sudo());
        let migration = config.database.migration.unwrap();
        assert_eq!(migration.user.as_deref(), Some("postgres"));
        assert!(migration.password.is_none());
    }
}
