use spacehost_protocol::Operation;
use spacehost_protocol::Policy;

use crate::glob;

/// The outcome of evaluating a single operation against a policy. `message`
/// operations always evaluate to `Allow`; policy evaluation never fails and
/// never suspends -- it is a pure function of `(Policy, Operation)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allow,
    Deny {
        reason: String,
        suggestion: Option<String>,
        policy_tag: String,
    },
    RequireApproval {
        reason: String,
        policy_tag: String,
    },
}

impl Decision {
    pub fn deny(reason: impl Into<String>, policy_tag: impl Into<String>) -> Self {
        Decision::Deny {
            reason: reason.into(),
            suggestion: None,
            policy_tag: policy_tag.into(),
        }
    }

    pub fn deny_with_suggestion(
        reason: impl Into<String>,
        suggestion: impl Into<String>,
        policy_tag: impl Into<String>,
    ) -> Self {
        Decision::Deny {
            reason: reason.into(),
            suggestion: Some(suggestion.into()),
            policy_tag: policy_tag.into(),
        }
    }

    pub fn require_approval(reason: impl Into<String>, policy_tag: impl Into<String>) -> Self {
        Decision::RequireApproval {
            reason: reason.into(),
            policy_tag: policy_tag.into(),
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// A resolved, immutable policy bound to a space. Evaluation is pure and
/// side-effect free, so `PolicyEngine` is cheaply `Clone` and safe to share
/// across concurrent runs of *different* spaces.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    policy: Policy,
}

impl PolicyEngine {
    pub fn new(policy: Policy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn evaluate(&self, op: &Operation) -> Decision {
        if op.is_filesystem() {
            self.evaluate_filesystem(op)
        } else if let Operation::Shell { command, .. } = op {
            self.evaluate_shell(command)
        } else {
            Decision::Allow
        }
    }

    fn evaluate_filesystem(&self, op: &Operation) -> Decision {
        let fs = &self.policy.filesystem;

        if !fs.enabled {
            return Decision::deny("Filesystem access is disabled", "filesystem.enabled");
        }

        if op.is_write() && fs.read_only {
            return Decision::deny("Filesystem is read-only", "filesystem.readOnly");
        }

        // Path is always present for filesystem operations.
        let path = op.path().unwrap_or_default();

        if let Some(blocked) = &fs.blocked_paths
            && glob::any_matches(blocked, path)
        {
            return Decision::deny(
                format!("Path '{path}' matches a blocked pattern"),
                "filesystem.blockedPaths",
            );
        }

        if let Some(allowed) = &fs.allowed_paths
            && !allowed.is_empty()
            && !glob::any_matches(allowed, path)
        {
            return Decision::deny(
                format!("Path '{path}' is not in the allowed paths"),
                "filesystem.allowedPaths",
            );
        }

        if let Operation::CreateFile { content, .. } = op
            && content.len() as u64 > fs.max_file_size
        {
            return Decision::deny(
                format!(
                    "File content ({} bytes) exceeds the maximum allowed size ({} bytes)",
                    content.len(),
                    fs.max_file_size
                ),
                "filesystem.maxFileSize",
            );
        }

        Decision::Allow
    }

    fn evaluate_shell(&self, command: &str) -> Decision {
        let shell = &self.policy.shell;

        if !shell.enabled {
            return Decision::deny("Shell access is disabled", "shell.enabled");
        }

        if let Some(blocked) = &shell.blocked_patterns
            && let Some(hit) = blocked.iter().find(|pattern| command.contains(pattern.as_str()))
        {
            return Decision::deny(
                format!("Command contains blocked pattern '{hit}'"),
                "shell.blockedPatterns",
            );
        }

        if let Some(allowed) = &shell.allowed_commands
            && !allowed.is_empty()
        {
            let base_token = base_command_token(command);
            if !allowed.iter().any(|a| a == base_token) {
                return Decision::deny_with_suggestion(
                    format!("Command '{base_token}' is not in the allowed command list"),
                    format!("Allowed commands: {}", allowed.join(", ")),
                    "shell.allowedCommands",
                );
            }
        }

        if let Some(approval) = &shell.approval_required
            && let Some(hit) = approval
                .iter()
                .find(|pattern| command.contains(pattern.as_str()))
        {
            return Decision::require_approval(
                format!("Command contains pattern '{hit}' that requires approval"),
                "shell.approvalRequired",
            );
        }

        Decision::Allow
    }
}

/// Extract the base command token: trim the command, then split on the
/// first ASCII space. Tabs or other whitespace are deliberately not
/// treated as delimiters (matches the source's `trim()` + single-space
/// split behavior).
pub fn base_command_token(command: &str) -> &str {
    let trimmed = command.trim();
    match trimmed.find(' ') {
        Some(idx) => &trimmed[..idx],
        None => trimmed,
    }
}

/// `effectiveTimeout(requested) = min(requested, policy.shell.timeout_ms)`
/// if `requested` is provided, else `policy.shell.timeout_ms`.
pub fn effective_timeout(requested_ms: Option<u64>, policy_timeout_ms: u64) -> u64 {
    match requested_ms {
        Some(requested) => requested.min(policy_timeout_ms),
        None => policy_timeout_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacehost_protocol::Encoding;
    use spacehost_protocol::PresetName;

    fn op_create(path: &str, content: &str) -> Operation {
        Operation::CreateFile {
            id: None,
            path: path.to_string(),
            content: content.to_string(),
            encoding: Encoding::Utf8,
            overwrite: false,
        }
    }

    fn op_shell(command: &str) -> Operation {
        Operation::Shell {
            id: None,
            command: command.to_string(),
            cwd: None,
            timeout_ms: None,
            env: None,
        }
    }

    #[test]
    fn message_always_allowed_for_any_preset() {
        for preset in [
            PresetName::Restrictive,
            PresetName::Standard,
            PresetName::Permissive,
        ] {
            let engine = PolicyEngine::new(Policy::preset(preset));
            let op = Operation::Message {
                id: None,
                content: "hi".to_string(),
            };
            assert_eq!(engine.evaluate(&op), Decision::Allow);
        }
    }

    #[test]
    fn restrictive_denies_writes() {
        let engine = PolicyEngine::new(Policy::preset(PresetName::Restrictive));
        let decision = engine.evaluate(&op_create("a.txt", "hi"));
        assert!(matches!(decision, Decision::Deny { policy_tag, .. } if policy_tag == "filesystem.readOnly"));
    }

    #[test]
    fn restrictive_denies_all_shell() {
        let engine = PolicyEngine::new(Policy::preset(PresetName::Restrictive));
        let decision = engine.evaluate(&op_shell("ls"));
        assert!(matches!(decision, Decision::Deny { policy_tag, .. } if policy_tag == "shell.enabled"));
    }

    #[test]
    fn blocked_pattern_wins_over_allowlisted_base_command() {
        let engine = PolicyEngine::new(Policy::preset(PresetName::Standard));
        // `bun` is allow-listed, but `sudo` appears later in the command.
        let decision = engine.evaluate(&op_shell("bun && sudo foo"));
        assert!(
            matches!(decision, Decision::Deny { policy_tag, .. } if policy_tag == "shell.blockedPatterns")
        );
    }

    #[test]
    fn approval_required_substring_gates_destructive_shell() {
        let engine = PolicyEngine::new(Policy::preset(PresetName::Standard));
        let decision = engine.evaluate(&op_shell("rm -rf tmp"));
        assert!(matches!(decision, Decision::RequireApproval { .. }));
    }

    #[test]
    fn create_file_over_max_size_is_denied() {
        let engine = PolicyEngine::new(Policy::preset(PresetName::Standard));
        let huge = "x".repeat(11 * 1024 * 1024);
        let decision = engine.evaluate(&op_create("big.txt", &huge));
        assert!(
            matches!(decision, Decision::Deny { policy_tag, .. } if policy_tag == "filesystem.maxFileSize")
        );
    }

    #[test]
    fn effective_timeout_never_exceeds_policy_timeout() {
        assert_eq!(effective_timeout(Some(999_999), 30_000), 30_000);
        assert_eq!(effective_timeout(Some(1_000), 30_000), 1_000);
        assert_eq!(effective_timeout(None, 30_000), 30_000);
    }

    #[test]
    fn base_token_split_only_on_ascii_space() {
        assert_eq!(base_command_token("  ls -la  "), "ls");
        assert_eq!(base_command_token("echo"), "echo");
    }
}
