// apkd-aio/src/process.rs
use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;

use apkd_common::error::{ApkdError, Result};
use tokio::process::Command;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Asynchronously runs an external command and captures its output. The
/// child is killed if it outlives `timeout`.
pub async fn run_command_async<S: AsRef<OsStr>>(
    program: S,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput> {
    let program = program.as_ref();
    debug!("Async Running command: {:?} {:?}", program, args);

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.kill_on_drop(true); // Ensure process is killed if the command handle is dropped
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null()); // Prevent hanging on stdin

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            error!("Async Failed to execute command {:?}: {}", program, e);
            return Err(ApkdError::CommandExecError(format!(
                "{}: {e}",
                program.to_string_lossy()
            )));
        }
        Err(_) => {
            error!(
                "Async Command {:?} timed out after {}s",
                program,
                timeout.as_secs()
            );
            return Err(ApkdError::CommandExecError(format!(
                "{} timed out after {}s",
                program.to_string_lossy(),
                timeout.as_secs()
            )));
        }
    };

    let result = CommandOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    // Log output only if command failed for debugging
    if !result.success() {
        debug!("Async Command failed with status: {}", output.status);
        if !result.stdout.trim().is_empty() {
            debug!("Stdout:\n{}", result.stdout.trim());
        }
        if !result.stderr.trim().is_empty() {
            debug!("Stderr:\n{}", result.stderr.trim());
        }
    } else {
        debug!("Async Command finished successfully.");
    }
    Ok(result)
}

/// Runs `script` through `sh -c`.
pub async fn run_shell_async(script: &str, timeout: Duration) -> Result<CommandOutput> {
    run_command_async("sh", &["-c", script], timeout).await
}
