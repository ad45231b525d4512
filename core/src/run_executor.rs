//! The batch driver: consumes operations, consults a `PolicyEngine`,
//! dispatches allowed operations to a `Sandbox`, and assembles events. A
//! pure-ish async function of `(operations, startIndex, policyOverride?) ->
//! (events, terminalStatus, nextPendingApproval?)` -- no coroutines, no
//! executor-internal state between calls.

use serde::Deserialize;
use serde::Serialize;
use spacehost_policy::Decision;
use spacehost_policy::PolicyEngine;
use spacehost_policy::effective_timeout;
use spacehost_protocol::ApprovalDetails;
use spacehost_protocol::Event;
use spacehost_protocol::EventKind;
use spacehost_protocol::Operation;
use spacehost_sandbox::SandboxPrimitives;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    AwaitingApproval,
    Cancelled,
    Error,
}

/// The suspension record carried on a run awaiting approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub operation_id: Option<String>,
    pub operation_type: String,
    pub reason: String,
    pub details: ApprovalDetails,
}

/// Everything one executor pass produces: the new events only (the caller
/// concatenates with any pre-suspension events on resume), the terminal
/// status, and the suspension record if execution stopped mid-batch.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub events: Vec<Event>,
    pub status: RunStatus,
    pub pending_approval: Option<PendingApproval>,
}

pub struct RunExecutor;

impl RunExecutor {
    /// Evaluate `operations` from the beginning.
    #[tracing::instrument(skip_all, fields(n = operations.len()))]
    pub async fn run<S: SandboxPrimitives>(operations: &[Operation], policy: &PolicyEngine, sandbox: &S) -> RunOutcome {
        Self::execute_from(operations, 0, false, policy, sandbox).await
    }

    /// Resume evaluation at `start_index`. `bypass_policy_at_start` treats
    /// the operation at `start_index` as pre-approved (used after an
    /// `approved` decision); every later operation is evaluated normally.
    #[tracing::instrument(skip_all, fields(start_index, bypass_policy_at_start))]
    pub async fn resume<S: SandboxPrimitives>(
        operations: &[Operation],
        start_index: usize,
        bypass_policy_at_start: bool,
        policy: &PolicyEngine,
        sandbox: &S,
    ) -> RunOutcome {
        Self::execute_from(operations, start_index, bypass_policy_at_start, policy, sandbox).await
    }

    async fn execute_from<S: SandboxPrimitives>(
        operations: &[Operation],
        start_index: usize,
        bypass_policy_at_start: bool,
        policy: &PolicyEngine,
        sandbox: &S,
    ) -> RunOutcome {
        let mut events = Vec::with_capacity(operations.len().saturating_sub(start_index));
        let mut index = start_index;

        while index < operations.len() {
            let op = &operations[index];
            let operation_id = op.id().map(str::to_string);
            let bypass = bypass_policy_at_start && index == start_index;
            let decision = if bypass { Decision::Allow } else { policy.evaluate(op) };

            match decision {
                Decision::Allow => {
                    let kind = dispatch(op, policy, sandbox).await;
                    events.push(Event::new(kind, operation_id));
                }
                Decision::Deny {
                    reason, suggestion, ..
                } => {
                    tracing::debug!(operation_type = op.type_tag(), %reason, "operation denied by policy");
                    events.push(Event::new(
                        EventKind::PolicyDenied {
                            operation_type: op.type_tag().to_string(),
                            reason,
                            suggestion,
                        },
                        operation_id,
                    ));
                }
                Decision::RequireApproval { reason, policy_tag } => {
                    let details = approval_details(op, &policy_tag);
                    tracing::info!(operation_type = op.type_tag(), %reason, "operation suspended for approval");
                    events.push(Event::new(
                        EventKind::ApprovalRequired {
                            operation_id: operation_id.clone(),
                            operation_type: op.type_tag().to_string(),
                            reason: reason.clone(),
                            details: details.clone(),
                        },
                        operation_id.clone(),
                    ));
                    return RunOutcome {
                        events,
                        status: RunStatus::AwaitingApproval,
                        pending_approval: Some(PendingApproval {
                            operation_id,
                            operation_type: op.type_tag().to_string(),
                            reason,
                            details,
                        }),
                    };
                }
            }

            index += 1;
        }

        RunOutcome {
            events,
            status: RunStatus::Completed,
            pending_approval: None,
        }
    }
}

fn approval_details(op: &Operation, policy_tag: &str) -> ApprovalDetails {
    ApprovalDetails {
        command: match op {
            Operation::Shell { command, .. } => Some(command.clone()),
            _ => None,
        },
        path: op.path().map(str::to_string),
        policy: Some(policy_tag.to_string()),
    }
}

async fn dispatch<S: SandboxPrimitives>(op: &Operation, policy: &PolicyEngine, sandbox: &S) -> EventKind {
    match op {
        Operation::Message { .. } => EventKind::Message { success: true },
        Operation::CreateFile {
            path,
            content,
            encoding,
            overwrite,
            ..
        } => sandbox.create_file(path, content, *encoding, *overwrite).await,
        Operation::ReadFile { path, encoding, .. } => sandbox.read_file(path, *encoding).await,
        Operation::EditFile { path, edits, .. } => sandbox.edit_file(path, edits).await,
        Operation::DeleteFile { path, .. } => sandbox.delete_file(path).await,
        Operation::Shell {
            command,
            cwd,
            timeout_ms,
            env,
            ..
        } => {
            let effective = effective_timeout(*timeout_ms, policy.policy().shell.timeout_ms);
            match sandbox.exec(command, cwd.as_deref(), env.as_ref(), effective).await {
                Ok(kind) => kind,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to start exec channel");
                    EventKind::Shell {
                        command: command.clone(),
                        success: false,
                        exit_code: Some(1),
                        stdout: None,
                        stderr: Some(e.to_string()),
                        duration_ms: None,
                        timed_out: false,
                        error: Some(e.to_string()),
                    }
                }
            }
        }
    }
}

/// A sandbox test double backed by an in-process temp directory for files
/// and a canned response table for shell commands, so `RunExecutor`
/// scenarios can be exercised without a container runtime.
#[cfg(test)]
pub(crate) struct FakeSandbox {
    workspace: tempfile::TempDir,
    shell_responses: std::collections::HashMap<String, EventKind>,
}

#[cfg(test)]
impl FakeSandbox {
    fn new() -> Self {
        Self {
            workspace: tempfile::tempdir().expect("tempdir"),
            shell_responses: std::collections::HashMap::new(),
        }
    }

    fn with_shell_response(mut self, command: &str, response: EventKind) -> Self {
        self.shell_responses.insert(command.to_string(), response);
        self
    }
}

#[cfg(test)]
impl SandboxPrimitives for FakeSandbox {
    async fn create_file(&self, path: &str, content: &str, _encoding: spacehost_protocol::Encoding, overwrite: bool) -> EventKind {
        let target = self.workspace.path().join(path);
        if !overwrite && target.exists() {
            return EventKind::CreateFile {
                path: path.to_string(),
                success: false,
                bytes_written: None,
                error: Some("File already exists".to_string()),
            };
        }
        std::fs::write(&target, content).expect("write");
        EventKind::CreateFile {
            path: path.to_string(),
            success: true,
            bytes_written: Some(content.len() as u64),
            error: None,
        }
    }

    async fn read_file(&self, path: &str, encoding: spacehost_protocol::Encoding) -> EventKind {
        let target = self.workspace.path().join(path);
        match std::fs::read_to_string(&target) {
            Ok(content) => EventKind::ReadFile {
                path: path.to_string(),
                success: true,
                size: Some(content.len() as u64),
                content: Some(content),
                encoding: Some(encoding),
                error: None,
            },
            Err(e) => EventKind::ReadFile {
                path: path.to_string(),
                success: false,
                content: None,
                encoding: None,
                size: None,
                error: Some(e.to_string()),
            },
        }
    }

    async fn edit_file(&self, path: &str, _edits: &[spacehost_protocol::Edit]) -> EventKind {
        EventKind::EditFile {
            path: path.to_string(),
            success: true,
            edits_applied: Some(_edits.len()),
            error: None,
        }
    }

    async fn delete_file(&self, path: &str) -> EventKind {
        let target = self.workspace.path().join(path);
        match std::fs::remove_file(&target) {
            Ok(()) => EventKind::DeleteFile {
                path: path.to_string(),
                success: true,
                error: None,
            },
            Err(e) => EventKind::DeleteFile {
                path: path.to_string(),
                success: false,
                error: Some(e.to_string()),
            },
        }
    }

    async fn exec(
        &self,
        command: &str,
        _cwd: Option<&str>,
        _env: Option<&std::collections::HashMap<String, String>>,
        _timeout_ms: u64,
    ) -> spacehost_sandbox::Result<EventKind> {
        Ok(self.shell_responses.get(command).cloned().unwrap_or(EventKind::Shell {
            command: command.to_string(),
            success: true,
            exit_code: Some(0),
            stdout: Some(String::new()),
            stderr: Some(String::new()),
            duration_ms: Some(0),
            timed_out: false,
            error: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use spacehost_protocol::Encoding;
    use spacehost_protocol::Policy;
    use spacehost_protocol::PresetName;

    fn op_message(id: &str, content: &str) -> Operation {
        Operation::Message {
            id: Some(id.to_string()),
            content: content.to_string(),
        }
    }

    fn op_shell(id: &str, command: &str) -> Operation {
        Operation::Shell {
            id: Some(id.to_string()),
            command: command.to_string(),
            cwd: None,
            timeout_ms: None,
            env: None,
        }
    }

    fn op_create_file(id: &str, path: &str, content: &str) -> Operation {
        Operation::CreateFile {
            id: Some(id.to_string()),
            path: path.to_string(),
            content: content.to_string(),
            encoding: Encoding::Utf8,
            overwrite: false,
        }
    }

    fn op_read_file(id: &str, path: &str) -> Operation {
        Operation::ReadFile {
            id: Some(id.to_string()),
            path: path.to_string(),
            encoding: Encoding::Utf8,
        }
    }

    #[tokio::test]
    async fn s1_happy_path() {
        let sandbox = FakeSandbox::new().with_shell_response(
            "cat a.txt",
            EventKind::Shell {
                command: "cat a.txt".to_string(),
                success: true,
                exit_code: Some(0),
                stdout: Some("hello".to_string()),
                stderr: Some(String::new()),
                duration_ms: Some(5),
                timed_out: false,
                error: None,
            },
        );
        let policy = PolicyEngine::new(Policy::preset(PresetName::Standard));
        let operations = vec![
            op_message("m1", "hi"),
            op_create_file("c1", "a.txt", "hello"),
            op_read_file("r1", "a.txt"),
            op_shell("s1", "cat a.txt"),
        ];

        let outcome = RunExecutor::run(&operations, &policy, &sandbox).await;

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.events.len(), 4);
        assert_eq!(outcome.events[0].kind.success(), Some(true));
        match &outcome.events[1].kind {
            EventKind::CreateFile { success, bytes_written, .. } => {
                assert!(success);
                assert_eq!(*bytes_written, Some(5));
            }
            other => panic!("unexpected: {other:?}"),
        }
        match &outcome.events[2].kind {
            EventKind::ReadFile { success, content, size, .. } => {
                assert!(success);
                assert_eq!(content.as_deref(), Some("hello"));
                assert_eq!(*size, Some(5));
            }
            other => panic!("unexpected: {other:?}"),
        }
        match &outcome.events[3].kind {
            EventKind::Shell { success, exit_code, stdout, .. } => {
                assert!(success);
                assert_eq!(*exit_code, Some(0));
                assert_eq!(stdout.as_deref(), Some("hello"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn s3_policy_denial_mid_batch_does_not_halt() {
        let sandbox = FakeSandbox::new();
        let policy = PolicyEngine::new(Policy::preset(PresetName::Standard));
        let operations = vec![
            op_create_file("c1", "ok.txt", "ok"),
            op_shell("s1", "sudo rm -rf /"),
            op_create_file("c2", "tail.txt", "t"),
        ];

        let outcome = RunExecutor::run(&operations, &policy, &sandbox).await;

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.events.len(), 3);
        assert_eq!(outcome.events[0].kind.success(), Some(true));
        match &outcome.events[1].kind {
            EventKind::PolicyDenied { operation_type, reason, .. } => {
                assert_eq!(operation_type, "shell");
                assert!(reason.contains("blocked"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(outcome.events[2].kind.success(), Some(true));
    }

    #[tokio::test]
    async fn s4_approval_gate_then_approve() {
        let sandbox = FakeSandbox::new().with_shell_response(
            "rm -rf tmp",
            EventKind::Shell {
                command: "rm -rf tmp".to_string(),
                success: true,
                exit_code: Some(0),
                stdout: Some(String::new()),
                stderr: Some(String::new()),
                duration_ms: Some(2),
                timed_out: false,
                error: None,
            },
        );
        let policy = PolicyEngine::new(Policy::preset(PresetName::Standard));
        let operations = vec![op_shell("op1", "rm -rf tmp")];

        let run_a = RunExecutor::run(&operations, &policy, &sandbox).await;
        assert_eq!(run_a.status, RunStatus::AwaitingApproval);
        assert_eq!(run_a.events.len(), 1);
        let pending = run_a.pending_approval.expect("pending approval");
        assert_eq!(pending.operation_id.as_deref(), Some("op1"));

        let run_b = RunExecutor::resume(&operations, 0, true, &policy, &sandbox).await;
        assert_eq!(run_b.status, RunStatus::Completed);
        assert_eq!(run_b.events.len(), 1);
        match &run_b.events[0].kind {
            EventKind::Shell { success, exit_code, .. } => {
                assert!(success);
                assert_eq!(*exit_code, Some(0));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn s5_approval_gate_then_deny() {
        let sandbox = FakeSandbox::new();
        let policy = PolicyEngine::new(Policy::preset(PresetName::Standard));
        let operations = vec![op_shell("op1", "rm -rf tmp")];

        let run_a = RunExecutor::run(&operations, &policy, &sandbox).await;
        assert_eq!(run_a.status, RunStatus::AwaitingApproval);

        // Denial is synthesized by the caller (`RunService::resume`); here we
        // exercise just the executor's continuation at `k+1`, which in a
        // single-operation batch is immediately exhausted.
        let run_b = RunExecutor::resume(&operations, 1, false, &policy, &sandbox).await;
        assert_eq!(run_b.status, RunStatus::Completed);
        assert!(run_b.events.is_empty());
    }

    #[tokio::test]
    async fn s6_shell_timeout() {
        let sandbox = FakeSandbox::new().with_shell_response(
            "sleep 10",
            EventKind::Shell {
                command: "sleep 10".to_string(),
                success: false,
                exit_code: Some(124),
                stdout: None,
                stderr: None,
                duration_ms: Some(2_000),
                timed_out: true,
                error: Some("command timed out after 2000ms".to_string()),
            },
        );
        let policy = PolicyEngine::new(Policy::standard());
        let operations = vec![op_shell("op1", "sleep 10")];

        let outcome = RunExecutor::run(&operations, &policy, &sandbox).await;

        assert_eq!(outcome.status, RunStatus::Completed);
        match &outcome.events[0].kind {
            EventKind::Shell {
                success,
                timed_out,
                exit_code,
                ..
            } => {
                assert!(!success);
                assert!(timed_out);
                assert_eq!(*exit_code, Some(124));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn message_operation_never_requires_a_sandbox_dispatch() {
        let op = op_message("op1", "hi");
        assert_eq!(op.type_tag(), "message");
    }

    #[test]
    fn approval_details_carries_command_for_shell_ops() {
        let op = op_shell("op1", "rm -rf tmp");
        let details = approval_details(&op, "shell.approvalRequired");
        assert_eq!(details.command.as_deref(), Some("rm -rf tmp"));
        assert_eq!(details.policy.as_deref(), Some("shell.approvalRequired"));
    }

    #[test]
    fn approval_details_carries_path_for_filesystem_ops() {
        let op = Operation::CreateFile {
            id: Some("op1".to_string()),
            path: "a.txt".to_string(),
            content: "hi".to_string(),
            encoding: Encoding::Utf8,
            overwrite: false,
        };
        let details = approval_details(&op, "filesystem.blockedPaths");
        assert_eq!(details.path.as_deref(), Some("a.txt"));
        assert!(details.command.is_none());
    }
}
