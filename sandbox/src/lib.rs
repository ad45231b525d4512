//! Container-backed sandbox: one sandbox owns one container and one
//! bind-mounted workspace directory. Filesystem operations act directly on
//! the host-side workspace; shell operations cross into the container via an
//! external container-runtime CLI.

mod config;
mod container;
mod error;
mod exec;
mod fs_ops;
mod primitives;
mod sandbox;

pub use config::SandboxConfig;
pub use config::workspace_base_dir_from_env;
pub use error::Result;
pub use error::SandboxError;
pub use fs_ops::FileEntry;
pub use primitives::SandboxPrimitives;
pub use sandbox::Sandbox;
