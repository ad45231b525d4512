//! The narrow "sandbox primitives" interface the Run Executor is built
//! against, rather than the concrete `Sandbox` type directly -- a
//! constructor-injected collaborator in place of a module-global singleton.
//! `Sandbox` is the only production implementation; tests elsewhere
//! substitute a fake that never shells out to a container runtime.

use std::collections::HashMap;

use spacehost_protocol::Edit;
use spacehost_protocol::Encoding;
use spacehost_protocol::EventKind;

use crate::error::Result;

pub trait SandboxPrimitives: Send + Sync {
    fn create_file(
        &self,
        path: &str,
        content: &str,
        encoding: Encoding,
        overwrite: bool,
    ) -> impl Future<Output = EventKind> + Send;

    fn read_file(&self, path: &str, encoding: Encoding) -> impl Future<Output = EventKind> + Send;

    fn edit_file(&self, path: &str, edits: &[Edit]) -> impl Future<Output = EventKind> + Send;

    fn delete_file(&self, path: &str) -> impl Future<Output = EventKind> + Send;

    fn exec(
        &self,
        command: &str,
        cwd: Option<&str>,
        env: Option<&HashMap<String, String>>,
        timeout_ms: u64,
    ) -> impl Future<Output = Result<EventKind>> + Send;
}

impl SandboxPrimitives for crate::Sandbox {
    async fn create_file(&self, path: &str, content: &str, encoding: Encoding, overwrite: bool) -> EventKind {
        crate::Sandbox::create_file(self, path, content, encoding, overwrite).await
    }

    async fn read_file(&self, path: &str, encoding: Encoding) -> EventKind {
        crate::Sandbox::read_file(self, path, encoding).await
    }

    async fn edit_file(&self, path: &str, edits: &[Edit]) -> EventKind {
        crate::Sandbox::edit_file(self, path, edits).await
    }

    async fn delete_file(&self, path: &str) -> EventKind {
        crate::Sandbox::delete_file(self, path).await
    }

    async fn exec(
        &self,
        command: &str,
        cwd: Option<&str>,
        env: Option<&HashMap<String, String>>,
        timeout_ms: u64,
    ) -> Result<EventKind> {
        crate::Sandbox::exec(self, command, cwd, env, timeout_ms).await
    }
}
