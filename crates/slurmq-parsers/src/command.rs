//! Command execution utilities for scheduler queries.

use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;

/// Error type for command execution.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to execute {command}: {error}")]
    Execution { command: String, error: String },
    #[error("Command {command} failed: {stderr}")]
    Failed { command: String, stderr: String },
    #[error("Command {command} timed out after {}s", .timeout.as_secs_f64())]
    Timeout { command: String, timeout: Duration },
}

impl CommandError {
    /// Name of the command that failed.
    pub fn command(&self) -> &str {
        match self {
            CommandError::Execution { command, .. }
            | CommandError::Failed { command, .. }
            | CommandError::Timeout { command, .. } => command,
        }
    }
}

/// Execute a command and return its raw stdout.
///
/// The child is killed if it does not finish within `timeout`, so a hung
/// scheduler daemon cannot stall the caller indefinitely. A non-zero exit
/// status is reported as [`CommandError::Failed`] carrying stderr.
pub async fn run_command_bytes(
    cmd: &mut Command,
    name: &str,
    timeout: Duration,
) -> Result<Vec<u8>, CommandError> {
    cmd.kill_on_drop(true);

    let started = Instant::now();
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| CommandError::Timeout {
            command: name.to_string(),
            timeout,
        })?
        .map_err(|e| CommandError::Execution {
            command: name.to_string(),
            error: e.to_string(),
        })?;

    tracing::debug!(
        command = name,
        status = %output.status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "command finished"
    );

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CommandError::Failed {
            command: name.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(output.stdout)
}

/// Execute a command and return stdout as a string.
///
/// Invalid UTF-8 is replaced rather than rejected.
pub async fn run_command(
    cmd: &mut Command,
    name: &str,
    timeout: Duration,
) -> Result<String, CommandError> {
    let stdout = run_command_bytes(cmd, name, timeout).await?;
    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_run_command_success() {
        let mut cmd = Command::new("echo");
        cmd.arg("hello");
        let result = run_command(&mut cmd, "echo", TIMEOUT).await.unwrap();
        assert_eq!(result.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_command_bytes_unmodified() {
        let mut cmd = Command::new("printf");
        cmd.arg("a,b\n\nc,d\n");
        let result = run_command_bytes(&mut cmd, "printf", TIMEOUT).await.unwrap();
        assert_eq!(result, b"a,b\n\nc,d\n");
    }

    #[tokio::test]
    async fn test_run_command_not_found() {
        let mut cmd = Command::new("nonexistent_command_12345");
        let result = run_command(&mut cmd, "nonexistent", TIMEOUT).await;
        assert!(matches!(result, Err(CommandError::Execution { .. })));
    }

    #[tokio::test]
    async fn test_run_command_nonzero_exit() {
        let mut cmd = Command::new("false");
        let result = run_command(&mut cmd, "false", TIMEOUT).await;
        let err = result.unwrap_err();
        assert!(matches!(err, CommandError::Failed { .. }));
        assert_eq!(err.command(), "false");
    }

    #[tokio::test]
    async fn test_run_command_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let result = run_command(&mut cmd, "sleep", Duration::from_millis(100)).await;
        match result {
            Err(CommandError::Timeout { command, timeout }) => {
                assert_eq!(command, "sleep");
                assert_eq!(timeout, Duration::from_millis(100));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
