//! Shell execution inside a running container via `docker exec`, with a
//! timeout-then-kill policy mirroring the teacher's own truncated-output /
//! capped-read exec path: spawn, race the child against a deadline, and on
//! expiry kill rather than wait forever.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;

use spacehost_protocol::EventKind;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::Result;
use crate::error::SandboxError;

/// Output beyond this many bytes per stream is truncated, the same
/// guardrail the teacher applies to long-running command output.
const MAX_CAPTURED_BYTES: usize = 1024 * 1024;

#[allow(clippy::too_many_arguments)]
pub async fn exec_in_container(
    runtime_bin: &str,
    container_name: &str,
    command: &str,
    cwd: Option<&str>,
    env: Option<&HashMap<String, String>>,
    timeout_ms: u64,
) -> Result<EventKind> {
    let mut args = vec!["exec".to_string()];
    if let Some(cwd) = cwd {
        args.push("-w".to_string());
        args.push(cwd.to_string());
    }
    if let Some(env) = env {
        for (k, v) in env {
            args.push("-e".to_string());
            args.push(format!("{k}={v}"));
        }
    }
    args.push(container_name.to_string());
    args.push("sh".to_string());
    args.push("-c".to_string());
    args.push(command.to_string());

    let mut child = Command::new(runtime_bin)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| SandboxError::ExecSpawn(format!("failed to spawn exec for `{command}`: {e}")))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| SandboxError::ExecSpawn("exec child was spawned without a stdout pipe".to_string()))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| SandboxError::ExecSpawn("exec child was spawned without a stderr pipe".to_string()))?;

    let started = Instant::now();
    let deadline = Duration::from_millis(timeout_ms);

    let read_both = async {
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let _ = stdout_pipe
            .take(MAX_CAPTURED_BYTES as u64)
            .read_to_end(&mut stdout_buf)
            .await;
        let _ = stderr_pipe
            .take(MAX_CAPTURED_BYTES as u64)
            .read_to_end(&mut stderr_buf)
            .await;
        let status = child.wait().await;
        (status, stdout_buf, stderr_buf)
    };

    match tokio::time::timeout(deadline, read_both).await {
        Ok((status, stdout_buf, stderr_buf)) => {
            let duration_ms = started.elapsed().as_millis() as u64;
            let stdout = String::from_utf8_lossy(&stdout_buf).into_owned();
            let stderr = String::from_utf8_lossy(&stderr_buf).into_owned();
            match status {
                Ok(status) => Ok(EventKind::Shell {
                    command: command.to_string(),
                    success: status.success(),
                    exit_code: status.code(),
                    stdout: Some(stdout),
                    stderr: Some(stderr),
                    duration_ms: Some(duration_ms),
                    timed_out: false,
                    error: None,
                }),
                Err(e) => Ok(EventKind::Shell {
                    command: command.to_string(),
                    success: false,
                    exit_code: None,
                    stdout: Some(stdout),
                    stderr: Some(stderr),
                    duration_ms: Some(duration_ms),
                    timed_out: false,
                    error: Some(e.to_string()),
                }),
            }
        }
        Err(_elapsed) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            let duration_ms = started.elapsed().as_millis() as u64;
            Ok(EventKind::Shell {
                command: command.to_string(),
                success: false,
                exit_code: Some(124),
                stdout: None,
                stderr: None,
                duration_ms: Some(duration_ms),
                timed_out: true,
                error: Some(format!("command timed out after {timeout_ms}ms")),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_event_reports_124_and_timed_out() {
        let event = EventKind::Shell {
            command: "sleep 10".to_string(),
            success: false,
            exit_code: Some(124),
            stdout: None,
            stderr: None,
            duration_ms: Some(50),
            timed_out: true,
            error: Some("command timed out after 50ms".to_string()),
        };
        match event {
            EventKind::Shell {
                exit_code, timed_out, ..
            } => {
                assert_eq!(exit_code, Some(124));
                assert!(timed_out);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
