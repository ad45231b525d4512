//! Container lifecycle driven by shelling out to an external container
//! runtime binary (default `docker`), the same way the teacher drives
//! `sandbox-exec`/a landlock helper: spawn, wait, capture output. No
//! container-engine SDK is linked in.

use std::collections::HashMap;
use std::process::Stdio;

use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::process::Command;

use crate::error::Result;
use crate::error::SandboxError;

async fn run_capturing(
    runtime_bin: &str,
    args: &[String],
) -> Result<(bool, String, String)> {
    let output = Command::new(runtime_bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| SandboxError::ContainerRuntime(format!("failed to spawn {runtime_bin}: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    Ok((output.status.success(), stdout, stderr))
}

/// `docker inspect --type image <image>` -- true if the image exists locally.
pub async fn image_exists(runtime_bin: &str, image: &str) -> Result<bool> {
    let (ok, _, _) = run_capturing(
        runtime_bin,
        &[
            "inspect".to_string(),
            "--type".to_string(),
            "image".to_string(),
            image.to_string(),
        ],
    )
    .await?;
    Ok(ok)
}

/// `docker pull <image>`, streaming progress lines to `tracing::info!`.
pub async fn pull_image(runtime_bin: &str, image: &str) -> Result<()> {
    tracing::info!(image, "pulling sandbox base image");
    let mut child = Command::new(runtime_bin)
        .args(["pull", image])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| SandboxError::ContainerRuntime(format!("failed to spawn pull: {e}")))?;

    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::info!(image, "{line}");
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| SandboxError::ContainerRuntime(format!("pull wait failed: {e}")))?;
    if !status.success() {
        return Err(SandboxError::ContainerRuntime(format!(
            "failed to pull image {image}"
        )));
    }
    Ok(())
}

pub async fn ensure_image(runtime_bin: &str, image: &str) -> Result<()> {
    if !image_exists(runtime_bin, image).await? {
        pull_image(runtime_bin, image).await?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn create_container(
    runtime_bin: &str,
    name: &str,
    image: &str,
    host_workspace: &str,
    work_dir: &str,
    env: &HashMap<String, String>,
    memory_limit: Option<&str>,
    cpu_limit: Option<&str>,
) -> Result<()> {
    let mut args = vec![
        "create".to_string(),
        "--name".to_string(),
        name.to_string(),
        "--network".to_string(),
        "none".to_string(),
        "-v".to_string(),
        format!("{host_workspace}:{work_dir}"),
        "-w".to_string(),
        work_dir.to_string(),
    ];
    for (k, v) in env {
        args.push("-e".to_string());
        args.push(format!("{k}={v}"));
    }
    if let Some(memory) = memory_limit {
        args.push("--memory".to_string());
        args.push(memory.to_string());
    }
    if let Some(cpu) = cpu_limit {
        args.push("--cpus".to_string());
        args.push(cpu.to_string());
    }
    args.push(image.to_string());
    args.push("sleep".to_string());
    args.push("infinity".to_string());

    let (ok, _stdout, stderr) = run_capturing(runtime_bin, &args).await?;
    if !ok {
        return Err(SandboxError::ContainerRuntime(format!(
            "failed to create container {name}: {stderr}"
        )));
    }
    Ok(())
}

pub async fn start_container(runtime_bin: &str, name: &str) -> Result<()> {
    let (ok, _stdout, stderr) = run_capturing(runtime_bin, &["start".to_string(), name.to_string()]).await?;
    if !ok {
        return Err(SandboxError::ContainerRuntime(format!(
            "failed to start container {name}: {stderr}"
        )));
    }
    Ok(())
}

/// `docker stop -t 5 <name>` followed by a forced `docker rm -f <name>`.
/// Idempotent: a missing container is not treated as an error.
pub async fn stop_and_remove(runtime_bin: &str, name: &str) -> Result<()> {
    let _ = run_capturing(
        runtime_bin,
        &["stop".to_string(), "-t".to_string(), "5".to_string(), name.to_string()],
    )
    .await;
    let _ = run_capturing(runtime_bin, &["rm".to_string(), "-f".to_string(), name.to_string()]).await;
    Ok(())
}
