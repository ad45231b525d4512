use thiserror::Error;

/// Exceptional sandbox failures the Run Executor surfaces as a top-level
/// System-class error. Per-operation failures (missing file, non-zero exit,
/// an edit probe that doesn't match) are NOT represented here -- they become
/// `success: false` fields on the corresponding event and never reach this
/// type. This is reserved for conditions that make the sandbox itself
/// unusable: the container runtime is gone, the image could not be pulled,
/// the workspace directory could not be created.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("container runtime error: {0}")]
    ContainerRuntime(String),

    #[error("failed to start exec channel: {0}")]
    ExecSpawn(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SandboxError>;
