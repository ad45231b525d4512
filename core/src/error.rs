use thiserror::Error;

use spacehost_protocol::SpaceId;

/// System-class failures: conditions that mean the core could not produce a
/// valid run at all. Policy, Execution, and Timeout outcomes never surface
/// here -- they are absorbed into a run's event stream.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no space with id {0}")]
    SpaceNotFound(SpaceId),

    #[error("no run with id {0}")]
    RunNotFound(String),

    #[error("run {0} is not awaiting approval")]
    RunNotAwaitingApproval(String),

    #[error("approval targets operation {expected}, but run is awaiting {actual}")]
    OperationIdMismatch { expected: String, actual: String },

    #[error(transparent)]
    Sandbox(#[from] spacehost_sandbox::SandboxError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
