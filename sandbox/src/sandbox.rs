//! A `Sandbox` owns exactly one container and its bind-mounted workspace
//! directory. Filesystem primitives act directly on the host-side workspace;
//! `exec` is the only primitive that crosses into the container via the
//! runtime CLI.

use std::path::PathBuf;

use spacehost_protocol::Edit;
use spacehost_protocol::Encoding;
use spacehost_protocol::EventKind;

use crate::config::SandboxConfig;
use crate::container;
use crate::error::Result;
use crate::exec;
use crate::fs_ops;

/// Prefix applied to the sandbox id to derive the container name, so that
/// `docker ps` output is self-describing without needing to cross-reference
/// a space registry.
const CONTAINER_NAME_PREFIX: &str = "spacehost-";

pub struct Sandbox {
    config: SandboxConfig,
    container_name: String,
}

impl Sandbox {
    /// Creates the bind-mounted workspace directory on the host, ensures the
    /// base image is present locally, then creates and starts the container.
    pub async fn create(config: SandboxConfig) -> Result<Self> {
        let host_workspace = config.host_workspace_dir();
        tokio::fs::create_dir_all(&host_workspace).await?;

        container::ensure_image(&config.container_runtime_bin, &config.base_image).await?;

        let container_name = format!("{CONTAINER_NAME_PREFIX}{}", config.id);
        container::create_container(
            &config.container_runtime_bin,
            &container_name,
            &config.base_image,
            &host_workspace.to_string_lossy(),
            &config.work_dir,
            &config.env,
            config.memory_limit.as_deref(),
            config.cpu_limit.as_deref(),
        )
        .await?;
        container::start_container(&config.container_runtime_bin, &container_name).await?;

        Ok(Self {
            config,
            container_name,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    fn workspace_root(&self) -> PathBuf {
        self.config.host_workspace_dir()
    }

    pub async fn create_file(&self, path: &str, content: &str, encoding: Encoding, overwrite: bool) -> EventKind {
        fs_ops::create_file(&self.workspace_root(), path, content, encoding, overwrite).await
    }

    pub async fn read_file(&self, path: &str, encoding: Encoding) -> EventKind {
        fs_ops::read_file(&self.workspace_root(), path, encoding).await
    }

    pub async fn edit_file(&self, path: &str, edits: &[Edit]) -> EventKind {
        fs_ops::edit_file(&self.workspace_root(), path, edits).await
    }

    pub async fn delete_file(&self, path: &str) -> EventKind {
        fs_ops::delete_file(&self.workspace_root(), path).await
    }

    /// Not driven by any wire operation; exposed for callers that want to
    /// inspect the resulting workspace state of a run.
    pub async fn list_files(&self, rel_dir: &str, recursive: bool) -> std::result::Result<Vec<fs_ops::FileEntry>, String> {
        fs_ops::list_files(&self.workspace_root(), rel_dir, recursive).await
    }

    pub async fn exec(
        &self,
        command: &str,
        cwd: Option<&str>,
        env: Option<&std::collections::HashMap<String, String>>,
        timeout_ms: u64,
    ) -> Result<EventKind> {
        exec::exec_in_container(
            &self.config.container_runtime_bin,
            &self.container_name,
            command,
            cwd,
            env,
            timeout_ms,
        )
        .await
    }

    /// Stops and force-removes the container, then recursively deletes the
    /// bind-mounted workspace directory. Idempotent: a workspace directory
    /// that is already gone is not an error.
    pub async fn destroy(&self) -> Result<()> {
        container::stop_and_remove(&self.config.container_runtime_bin, &self.container_name).await?;
        match tokio::fs::remove_dir_all(self.workspace_root()).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    pub fn host_workspace_dir(&self) -> PathBuf {
        self.config.host_workspace_dir()
    }
}
