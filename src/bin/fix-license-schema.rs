//! Migration runner using the psql command-line client
//!
//! Applies the license-schema fix migration by handing the whole file to
//! psql, so no database driver privileges are needed beyond what psql itself
//! has. Supports elevated execution as the postgres OS user via sudo when
//! `database.migration.use_sudo` is set (the elevation credential must come
//! from `SUDO_PASSWORD`).
//!
//! Usage:
//!   fix-license-schema [--root <path>] [--config <path>] [--file <path>]

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use cloud_migrate::services::{Elevation, PsqlConfig, PsqlRunner};
use cloud_migrate::utils::resolve_migration_file;
use cloud_migrate::{AppConfig, ConnectionParams, EnvOverrides};

/// Migration applied by this tool
const DEFAULT_MIGRATION_FILE: &str = "migrations/009_fix_license_schema.sql";

struct Options {
    root: Option<PathBuf>,
    config: Option<PathBuf>,
    file: Option<PathBuf>,
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let options = match parse_args() {
        Some(options) => options,
        None => return,
    };

    match run(options).await {
        Ok(true) => {
            info!("migration completed successfully");
        }
        Ok(false) => {
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("migration failed: {e:#}");
            std::process::exit(1);
        }
    }
}

fn parse_args() -> Option<Options> {
    let args: Vec<String> = env::args().collect();
    let mut options = Options {
        root: None,
        config: None,
        file: None,
        verbose: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--root" => {
                if i + 1 < args.len() {
                    options.root = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" => {
                if i + 1 < args.len() {
                    options.config = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--file" => {
                if i + 1 < args.len() {
                    options.file = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--verbose" | "-v" => {
                options.verbose = true;
            }
            "--help" | "-h" => {
                print_help();
                return None;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    Some(options)
}

async fn run(options: Options) -> Result<bool> {
    let _ = dotenvy::dotenv();

    let root = match options.root {
        Some(root) => root,
        None => env::current_dir().context("Failed to determine current directory")?,
    };

    // Configuration first, so the log level can come from it
    let config = AppConfig::load(&root, options.config.as_deref())
        .context("Failed to load configuration")?;

    let log_level = if options.verbose {
        Level::DEBUG
    } else {
        config.logging.level.parse().unwrap_or(Level::INFO)
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    let params = ConnectionParams::resolve(&config.database, &EnvOverrides::from_env())?;
    let elevation = Elevation::from_env(config.use_sudo())?;

    // The file must exist before psql is invoked
    let migration_path = resolve_migration_file(&root, options.file, DEFAULT_MIGRATION_FILE)?;

    info!("applying migration: {}", migration_path.display());
    info!("database: {} (user: {})", params.display_target(), params.user);
    if elevation.is_some() {
        info!("elevation enabled: running psql as the postgres OS user");
    }

    let runner = PsqlRunner::new(PsqlConfig::default());
    let result = runner
        .run_file(&params, &migration_path, elevation.as_ref())
        .await?;

    if result.success {
        if !result.stdout.is_empty() {
            println!("{}", result.stdout);
        }
        Ok(true)
    } else {
        error!("psql exited with code {:?}", result.exit_code);
        if !result.stderr.is_empty() {
            eprintln!("{}", result.stderr);
        }
        if !result.stdout.is_empty() {
            println!("{}", result.stdout);
        }
        if let Some(hint) = result.permission_hint() {
            eprintln!("{hint}");
        }
        Ok(false)
    }
}

fn print_help() {
    println!("fix-license-schema - apply the license schema fix via psql");
    println!();
    println!("Usage:");
    println!("  fix-license-schema [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --root <path>    Project root directory (default: current directory)");
    println!("  --config <path>  Path to configuration file (default: <root>/config.yaml)");
    println!("  --file <path>    Migration file to apply");
    println!("                   (default: <root>/{DEFAULT_MIGRATION_FILE})");
    println!("  -v, --verbose    Enable verbose output");
    println!("  -h, --help       Show this help message");
    println!();
    println!("The database password is passed to psql via PGPASSWORD. With");
    println!("database.migration.use_sudo enabled, SUDO_PASSWORD must be set;");
    println!("there is no default elevation credential.");
}
