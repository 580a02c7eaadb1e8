//! External SQL client invocation
//!
//! Runs a migration file through the `psql` command-line client. The database
//! password travels via the `PGPASSWORD` environment variable, never on the
//! command line. When elevation is configured the invocation is wrapped in
//! `sudo -S -u <superuser>` and the elevation password is written to sudo's
//! stdin; the credential must come from the `SUDO_PASSWORD` environment
//! variable, there is no built-in default.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::ConnectionParams;
use crate::utils::error::{MigrateError, MigrateResult};

/// psql client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsqlConfig {
    /// Path to the psql binary
    #[serde(default = "default_binary_path")]
    pub binary_path: PathBuf,
    /// Invocation timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_binary_path() -> PathBuf {
    PathBuf::from("psql")
}

fn default_timeout() -> u64 {
    600
}

impl Default for PsqlConfig {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Elevated-execution settings for a sudo-wrapped invocation
#[derive(Debug, Clone)]
pub struct Elevation {
    /// OS identity to run psql as
    pub superuser: String,
    /// sudo password, fed to stdin via `sudo -S`
    pub password: String,
}

impl Elevation {
    /// Resolve elevation settings from a credential, if elevation is wanted.
    ///
    /// A missing or empty credential with `use_sudo` enabled is a
    /// configuration error, surfaced before anything is spawned. The upstream
    /// tooling shipped a hardcoded fallback credential here; that is
    /// deliberately not carried over.
    pub fn resolve(use_sudo: bool, credential: Option<String>) -> MigrateResult<Option<Self>> {
        if !use_sudo {
            return Ok(None);
        }
        match credential {
            Some(password) if !password.is_empty() => Ok(Some(Self {
                superuser: "postgres".to_string(),
                password,
            })),
            _ => Err(MigrateError::ElevationCredentialMissing),
        }
    }

    /// Resolve elevation from the `SUDO_PASSWORD` environment variable.
    pub fn from_env(use_sudo: bool) -> MigrateResult<Option<Self>> {
        Self::resolve(use_sudo, std::env::var("SUDO_PASSWORD").ok())
    }
}

/// Captured result of a psql invocation
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl InvocationResult {
    /// Remediation hint when the combined output points at an ownership or
    /// permission problem.
    pub fn permission_hint(&self) -> Option<&'static str> {
        let combined = format!("{}\n{}", self.stderr, self.stdout);
        if combined.contains("must be owner") || combined.to_lowercase().contains("permission denied")
        {
            Some(
                "Hint: run the migration as the postgres superuser, or configure a \
                 privileged migration user under database.migration in config.yaml",
            )
        } else {
            None
        }
    }
}

/// psql runner for whole-file migration execution
pub struct PsqlRunner {
    config: PsqlConfig,
}

impl PsqlRunner {
    pub fn new(config: PsqlConfig) -> Self {
        Self { config }
    }

    /// Check that psql can be executed at all
    pub async fn check_availability(&self) -> Result<bool> {
        let output = Command::new(&self.config.binary_path)
            .arg("--version")
            .output()
            .await
            .context("Failed to execute psql --version")?;

        if output.status.success() {
            let version = String::from_utf8_lossy(&output.stdout);
            info!("psql is available: {}", version.trim());
            Ok(true)
        } else {
            warn!("psql version check failed");
            Ok(false)
        }
    }

    /// Build the program and argument vector for an invocation. Pure, so the
    /// shape is testable without spawning; the password is deliberately not
    /// part of it.
    pub fn build_invocation(
        &self,
        params: &ConnectionParams,
        file: &Path,
        elevation: Option<&Elevation>,
    ) -> (String, Vec<String>) {
        let psql_args = vec![
            "-h".to_string(),
            params.host.clone(),
            "-p".to_string(),
            params.port.to_string(),
            "-U".to_string(),
            params.user.clone(),
            "-d".to_string(),
            params.dbname.clone(),
            "-v".to_string(),
            "ON_ERROR_STOP=0".to_string(),
            "-f".to_string(),
            file.to_string_lossy().into_owned(),
        ];

        match elevation {
            Some(elev) => {
                let mut args = vec![
                    "-S".to_string(),
                    "-u".to_string(),
                    elev.superuser.clone(),
                    self.config.binary_path.to_string_lossy().into_owned(),
                ];
                args.extend(psql_args);
                ("sudo".to_string(), args)
            }
            None => (
                self.config.binary_path.to_string_lossy().into_owned(),
                psql_args,
            ),
        }
    }

    /// Run a migration file through psql, capturing output.
    ///
    /// A zero child exit code is success, anything else a hard failure; the
    /// whole invocation is treated as atomic.
    pub async fn run_file(
        &self,
        params: &ConnectionParams,
        file: &Path,
        elevation: Option<&Elevation>,
    ) -> MigrateResult<InvocationResult> {
        let (program, args) = self.build_invocation(params, file, elevation);
        debug!("executing: {program} {}", args.join(" "));

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .stdin(if elevation.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if !params.password.is_empty() {
            cmd.env("PGPASSWORD", &params.password);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| MigrateError::ClientInvocation(format!("{program}: {e}")))?;

        // sudo -S reads the elevation password from stdin
        if let Some(elev) = elevation {
            if let Some(mut stdin) = child.stdin.take() {
                let credential = format!("{}\n", elev.password);
                if let Err(e) = stdin.write_all(credential.as_bytes()).await {
                    warn!("failed to write elevation credential to sudo: {e}");
                }
                // Dropping the handle closes the pipe
            }
        }

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| MigrateError::ClientInvocation("stdout not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MigrateError::ClientInvocation("stderr not captured".to_string()))?;

        let timeout_duration = Duration::from_secs(self.config.timeout_seconds);
        let result = timeout(timeout_duration, async {
            let mut stdout_buf = String::new();
            let mut stderr_buf = String::new();

            let stdout_task = async {
                stdout.read_to_string(&mut stdout_buf).await?;
                Ok::<_, std::io::Error>(stdout_buf)
            };
            let stderr_task = async {
                stderr.read_to_string(&mut stderr_buf).await?;
                Ok::<_, std::io::Error>(stderr_buf)
            };

            let (stdout_result, stderr_result, status) =
                tokio::join!(stdout_task, stderr_task, child.wait());

            let stdout_str = stdout_result.unwrap_or_default();
            let stderr_str = stderr_result.unwrap_or_default();
            let exit_status = status?;

            Ok::<_, std::io::Error>((stdout_str, stderr_str, exit_status))
        })
        .await;

        match result {
            Ok(Ok((stdout_str, stderr_str, exit_status))) => {
                let success = exit_status.success();
                let exit_code = exit_status.code();

                if success {
                    info!("psql completed successfully (exit_code={exit_code:?})");
                } else {
                    error!("psql FAILED: exit_code={exit_code:?}");
                }

                Ok(InvocationResult {
                    success,
                    stdout: stdout_str,
                    stderr: stderr_str,
                    exit_code,
                })
            }
            Ok(Err(e)) => Err(MigrateError::ClientInvocation(e.to_string())),
            Err(_) => {
                error!(
                    "psql TIMEOUT after {}s, killing child",
                    self.config.timeout_seconds
                );
                let _ = child.kill().await;
                Err(MigrateError::ClientInvocation(format!(
                    "psql timed out after {} seconds",
                    self.config.timeout_seconds
                )))
            }
        }
    }
}
