//! `spacehost`: a thin CLI front end exercising the core end-to-end, the
//! same role the teacher's `codex-exec` plays for `codex-core` -- a direct
//! caller of the library API standing in for "the HTTP routing surface"
//! collaborator that spec.md declares out of scope.

mod cli;
mod event_processor;

use std::io::IsTerminal;
use std::io::Write;
use std::sync::Arc;

use event_processor::EventProcessor;
use spacehost_core::ApprovalDecision;
use spacehost_core::ApprovalDecisionRequest;
use spacehost_core::CreateSpaceOptions;
use spacehost_core::MemoryApprovalStore;
use spacehost_core::MemoryRunStore;
use spacehost_core::MemorySpaceStore;
use spacehost_core::RunRecord;
use spacehost_core::RunService;
use spacehost_core::RunStatus;
use spacehost_core::SpaceManager;
use spacehost_protocol::Operation;
use spacehost_protocol::PROTOCOL_VERSION;
use spacehost_protocol::validate_operations_message;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub use cli::ApprovalMode;
pub use cli::Cli;
pub use cli::Color;
pub use cli::Preset;

/// Either shape accepted on the wire: a full envelope or a bare array of
/// operations, wrapped with the current protocol version.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum BatchFile {
    Envelope(spacehost_protocol::OperationsMessage),
    Bare(Vec<Operation>),
}

fn init_tracing() {
    let default_level = "info";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn run_main(cli: Cli) -> anyhow::Result<()> {
    init_tracing();

    let with_ansi = cli.color.use_ansi();
    let processor = EventProcessor::create_with_ansi(with_ansi);

    let raw = std::fs::read_to_string(&cli.batch)
        .map_err(|e| anyhow::anyhow!("failed to read batch file {}: {e}", cli.batch.display()))?;
    let batch: BatchFile = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("failed to parse batch file {}: {e}", cli.batch.display()))?;
    let message = match batch {
        BatchFile::Envelope(message) => message,
        BatchFile::Bare(operations) => spacehost_protocol::OperationsMessage {
            protocol_version: PROTOCOL_VERSION.to_string(),
            operations,
        },
    };
    if let Err(err) = validate_operations_message(&message) {
        for issue in &err.issues {
            eprintln!("validation error at {}: {}", issue.path, issue.message);
        }
        anyhow::bail!("batch failed validation");
    }

    let workspace_base_dir = cli
        .workspace_base_dir
        .clone()
        .unwrap_or_else(spacehost_sandbox::workspace_base_dir_from_env);
    std::fs::create_dir_all(&workspace_base_dir)?;

    let space_manager = Arc::new(SpaceManager::new(MemorySpaceStore::new(), workspace_base_dir));
    let run_service = RunService::new(space_manager.clone(), MemoryRunStore::new(), MemoryApprovalStore::new());

    let space = space_manager
        .create(CreateSpaceOptions {
            name: cli.name.clone(),
            policy_preset: Some(cli.preset.into()),
            base_image: cli.base_image.clone(),
            ..Default::default()
        })
        .await?;
    info!(space_id = %space.id, "space created");

    let mut run = run_service.create(&space.id, message.operations).await?;
    print_new_events(&processor, &run, 0);

    loop {
        if run.status != RunStatus::AwaitingApproval {
            break;
        }
        let Some(pending) = run.pending_approval.clone() else {
            break;
        };
        let operation_id = pending.operation_id.clone().unwrap_or_default();
        let decision = resolve_approval(cli.approve, &pending.operation_type, &pending.reason);

        let previous_len = run.events.len();
        run = run_service
            .resume(
                &run.id,
                ApprovalDecisionRequest {
                    operation_id,
                    decision,
                    reason: None,
                },
            )
            .await?;
        print_new_events(&processor, &run, previous_len);
    }

    if !cli.keep {
        space_manager.destroy(&space.id).await?;
    }

    let exit_code = match run.status {
        RunStatus::Completed => 0,
        _ => 1,
    };
    std::process::exit(exit_code);
}

fn print_new_events(processor: &EventProcessor, run: &RunRecord, from: usize) {
    for event in &run.events[from..] {
        processor.process_event(event);
    }
}

fn resolve_approval(mode: ApprovalMode, operation_type: &str, reason: &str) -> ApprovalDecision {
    match mode {
        ApprovalMode::ApproveAll => ApprovalDecision::Approved,
        ApprovalMode::DenyAll => ApprovalDecision::Denied,
        ApprovalMode::Interactive => {
            if !std::io::stdin().is_terminal() {
                return ApprovalDecision::Denied;
            }
            print!("Approve {operation_type} ({reason})? [y/N] ");
            let _ = std::io::stdout().flush();
            let mut answer = String::new();
            if std::io::stdin().read_line(&mut answer).is_err() {
                return ApprovalDecision::Denied;
            }
            match answer.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => ApprovalDecision::Approved,
                _ => ApprovalDecision::Denied,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn approve_all_mode_never_prompts() {
        assert_eq!(
            resolve_approval(ApprovalMode::ApproveAll, "shell", "gated"),
            ApprovalDecision::Approved
        );
    }

    #[test]
    fn deny_all_mode_never_prompts() {
        assert_eq!(
            resolve_approval(ApprovalMode::DenyAll, "shell", "gated"),
            ApprovalDecision::Denied
        );
    }

    #[test]
    fn bare_operations_array_is_wrapped_with_current_protocol_version() {
        let json = serde_json::json!([{"type": "message", "content": "hi"}]);
        let batch: BatchFile = serde_json::from_value(json).expect("parse");
        let BatchFile::Bare(operations) = batch else {
            panic!("expected a bare operations array");
        };
        assert_eq!(operations.len(), 1);
    }

    #[test]
    fn full_envelope_parses_as_envelope_variant() {
        let json = serde_json::json!({
            "protocolVersion": "1.0",
            "operations": [{"type": "message", "content": "hi"}],
        });
        let batch: BatchFile = serde_json::from_value(json).expect("parse");
        assert!(matches!(batch, BatchFile::Envelope(_)));
    }
}
