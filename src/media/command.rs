//! Testable execution of external media tools (ffprobe, ffmpeg, yt-dlp).
//!
//! The `CommandExecutor` trait lets every component that shells out be driven
//! by a mock in tests.

use crate::error::{Result, ScribeError};
use std::ffi::OsStr;
use std::process::Command;
use std::sync::Arc;

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync for use from worker tasks.
pub trait CommandExecutor: Send + Sync {
    /// Execute `program` with `args`.
    ///
    /// Returns stdout on success. Returns `ToolNotFound` if the program is
    /// missing and `ToolFailed` (carrying stderr) on a non-zero exit.
    fn execute(&self, program: &str, args: &[&OsStr]) -> Result<String>;
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for Arc<T> {
    fn execute(&self, program: &str, args: &[&OsStr]) -> Result<String> {
        (**self).execute(program, args)
    }
}

/// Production command executor using std::process::Command.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, program: &str, args: &[&OsStr]) -> Result<String> {
        tracing::debug!(program, ?args, "running media tool");

        let output = Command::new(program).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScribeError::ToolNotFound {
                    tool: program.to_string(),
                }
            } else {
                ScribeError::ToolFailed {
                    tool: program.to_string(),
                    message: format!("failed to execute: {}", e),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScribeError::ToolFailed {
                tool: program.to_string(),
                message: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
