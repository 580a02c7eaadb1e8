//! Schema migration tools for the cloud platform database
//!
//! This crate backs two operational binaries:
//! - `run-migration`: applies a migration through a direct PostgreSQL
//!   connection, statement by statement, and verifies the resulting schema.
//! - `fix-license-schema`: applies a migration by invoking the `psql`
//!   command-line client, optionally elevated to the postgres superuser.

pub mod config;
pub mod db;
pub mod services;
pub mod utils;

pub use config::{AppConfig, ConnectionParams, EnvOverrides};
pub use utils::error::{MigrateError, MigrateResult};
