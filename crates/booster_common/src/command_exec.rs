//! Command execution layer for stage backends and the probe.
//!
//! Executes one external tool invocation and captures exit code, stdout,
//! stderr and duration without reinterpreting them. Everything that talks
//! to the system goes through the [`CommandRunner`] trait so tests can
//! substitute a recording mock.

use crate::error::BoostError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command;
use std::time::Instant;

/// Maximum output length to capture (prevent memory issues)
const MAX_OUTPUT_BYTES: usize = 64 * 1024; // 64KB

/// One external command invocation: program plus arguments, no shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        CommandSpec {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            f.write_str(&self.program)
        } else {
            write!(f, "{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecStatus {
    /// Command ran successfully (exit code 0)
    Success,
    /// Command ran but returned non-zero exit code
    NonZeroExit,
    /// Command not found on system
    NotFound,
    /// Permission denied, either at spawn or reported on stderr
    PermissionDenied,
    /// Other OS error at spawn time
    OsError,
}

impl ExecStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NonZeroExit => "non-zero exit",
            Self::NotFound => "command not found",
            Self::PermissionDenied => "permission denied",
            Self::OsError => "OS error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Captured result of one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    pub status: ExecStatus,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Short failure description for stage errors and logs.
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("{} (exit code {})", self.status.as_str(), self.exit_code)
        } else {
            format!("{}: {}", self.status.as_str(), stderr)
        }
    }
}

/// Executes command specs. Implemented by the real system runner and by
/// the recording mock used in tests.
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, BoostError>;
}

/// Runner backed by `std::process::Command`.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        SystemRunner
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, BoostError> {
        let start = Instant::now();
        let output = Command::new(&spec.program).args(&spec.args).output();
        let duration_ms = start.elapsed().as_millis() as u64;

        match output {
            Ok(output) => {
                let stdout = truncate_output(&output.stdout);
                let stderr = truncate_output(&output.stderr);
                let exit_code = output.status.code().unwrap_or(-1);

                let status = if output.status.success() {
                    ExecStatus::Success
                } else if is_permission_stderr(&stderr) {
                    ExecStatus::PermissionDenied
                } else {
                    ExecStatus::NonZeroExit
                };

                Ok(CommandOutput {
                    status,
                    exit_code,
                    stdout,
                    stderr,
                    duration_ms,
                })
            }
            Err(e) => {
                let status = match e.kind() {
                    std::io::ErrorKind::NotFound => ExecStatus::NotFound,
                    std::io::ErrorKind::PermissionDenied => ExecStatus::PermissionDenied,
                    _ => ExecStatus::OsError,
                };
                Ok(CommandOutput {
                    status,
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: format!("OS error: {}", e),
                    duration_ms,
                })
            }
        }
    }
}

/// Detect permission failures reported by tools that still exit non-zero.
fn is_permission_stderr(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("permission denied") || lower.contains("operation not permitted")
}

fn truncate_output(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() > MAX_OUTPUT_BYTES {
        let mut truncated: String = text.chars().take(MAX_OUTPUT_BYTES).collect();
        truncated.push_str("\n[output truncated]");
        truncated
    } else {
        text.into_owned()
    }
}
