//! Migration runner using a direct database connection
//!
//! Applies the cabinet activation-fields migration statement by statement,
//! tolerating privilege and duplicate errors, then verifies the expected
//! columns against the catalog. The verification result is the authoritative
//! exit signal.
//!
//! Usage:
//!   run-migration [--root <path>] [--config <path>] [--file <path>]
//!
//! Options:
//!   --root    Project root directory (default: current directory)
//!   --config  Path to configuration file (default: <root>/config.yaml)
//!   --file    Migration file to apply (default: <root>/migrations/006_add_cabinet_activation_fields.sql)
//!   --verbose Enable verbose output

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use cloud_migrate::services::{
    run_statements, split_statements, verify_columns, OutcomeCounts,
};
use cloud_migrate::utils::resolve_migration_file;
use cloud_migrate::{db, AppConfig, ConnectionParams, EnvOverrides};

/// Migration applied by this tool
const DEFAULT_MIGRATION_FILE: &str = "migrations/006_add_cabinet_activation_fields.sql";

/// Table and columns the migration must produce
const VERIFIED_TABLE: &str = "cabinets";
const EXPECTED_COLUMNS: &[&str] = &["activation_status", "registration_token", "api_key"];

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
            error!("migration incomplete: expected columns are missing, check privileges");
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

    // The file must exist before any connection is attempted
    let migration_path = resolve_migration_file(&root, options.file, DEFAULT_MIGRATION_FILE)?;
    let sql = std::fs::read_to_string(&migration_path)
        .with_context(|| format!("Failed to read migration file: {migration_path:?}"))?;

    info!("applying migration: {}", migration_path.display());
    info!("database: {} (user: {})", params.display_target(), params.user);

    let pool = db::connect(&params)
        .await
        .context("Failed to connect to database")?;

    let statements = split_statements(&sql);
    info!("{} statements to execute", statements.len());

    let records = run_statements(&pool, &statements).await;
    let counts = OutcomeCounts::tally(&records);
    info!(
        "executed {} statements: {} succeeded, {} skipped (privilege), {} skipped (duplicate), {} failed",
        records.len(),
        counts.succeeded,
        counts.skipped_privilege,
        counts.skipped_duplicate,
        counts.failed
    );

    let report = verify_columns(&pool, VERIFIED_TABLE, EXPECTED_COLUMNS)
        .await
        .context("Failed to verify schema")?;
    report.log();

    pool.close().await;

    // Per-statement failures are advisory; the catalog decides
    Ok(report.passed())
}

fn print_help() {
    println!("run-migration - apply the cabinet activation-fields migration");
    println!();
    println!("Usage:");
    println!("  run-migration [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --root <path>    Project root directory (default: current directory)");
    println!("  --config <path>  Path to configuration file (default: <root>/config.yaml)");
    println!("  --file <path>    Migration file to apply");
    println!("                   (default: <root>/{DEFAULT_MIGRATION_FILE})");
    println!("  -v, --verbose    Enable verbose output");
    println!("  -h, --help       Show this help message");
    println!();
    println!("Connection parameters come from config.yaml (database.postgres, with");
    println!("database.migration overriding user/password) and can be overridden by");
    println!("DB_HOST, DB_PORT, DB_USER, DB_PASSWORD and DB_NAME.");
}
