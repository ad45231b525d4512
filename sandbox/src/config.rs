use std::collections::HashMap;
use std::path::PathBuf;

/// Configuration for one sandbox: exactly one container, one bind-mounted
/// workspace directory.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// The sandbox/workspace id (12 lowercase alphanumeric chars, no prefix --
    /// distinct from the owning space's `spc_`-prefixed id).
    pub id: String,
    pub base_image: String,
    /// Path inside the container the workspace is mounted at.
    pub work_dir: String,
    /// Host directory under which `<id>` is created and bind-mounted.
    pub workspace_base_dir: PathBuf,
    pub env: HashMap<String, String>,
    pub timeout_ms: u64,
    pub memory_limit: Option<String>,
    pub cpu_limit: Option<String>,
    /// Name of the container-runtime CLI to shell out to (`docker`, `podman`, ...).
    pub container_runtime_bin: String,
}

impl SandboxConfig {
    pub fn new(id: impl Into<String>, workspace_base_dir: PathBuf) -> Self {
        Self {
            id: id.into(),
            base_image: default_base_image(),
            work_dir: "/workspace".to_string(),
            workspace_base_dir,
            env: HashMap::new(),
            timeout_ms: default_timeout_ms(),
            memory_limit: None,
            cpu_limit: None,
            container_runtime_bin: "docker".to_string(),
        }
    }

    pub fn host_workspace_dir(&self) -> PathBuf {
        self.workspace_base_dir.join(&self.id)
    }
}

fn default_base_image() -> String {
    std::env::var("SANDBOX_BASE_IMAGE").unwrap_or_else(|_| "sandbox-runtime:latest".to_string())
}

fn default_timeout_ms() -> u64 {
    std::env::var("SANDBOX_TIMEOUT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30_000)
}

/// Base directory under which every space's workspace is created, driven by
/// `WORKSPACE_BASE_DIR`.
pub fn workspace_base_dir_from_env() -> PathBuf {
    std::env::var("WORKSPACE_BASE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("spacehost-workspaces"))
}
