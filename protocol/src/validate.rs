use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::operation::Operation;

const MAX_MESSAGE_CONTENT_CHARS: usize = 100_000;
const MAX_FILE_CONTENT_BYTES: usize = 10 * 1024 * 1024;
const MAX_PATH_LEN: usize = 255;
const MAX_SHELL_COMMAND_CHARS: usize = 4_096;
const MIN_SHELL_TIMEOUT_MS: u64 = 1_000;
const MAX_SHELL_TIMEOUT_MS: u64 = 3_600_000;
pub const PROTOCOL_VERSION: &str = "1.0";

/// One offending field in an invalid envelope or operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

impl Issue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("validation failed: {} issue(s)", issues.len())]
pub struct ValidationError {
    pub issues: Vec<Issue>,
}

impl ValidationError {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![Issue::new(path, message)],
        }
    }
}

/// Validate a path that crosses a trust boundary: relative, no leading
/// separator, no `..` traversal segment, no NUL byte, length <= 255.
pub fn validate_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("path must not be empty".to_string());
    }
    if path.len() > MAX_PATH_LEN {
        return Err(format!("path exceeds {MAX_PATH_LEN} characters"));
    }
    if path.contains('\0') {
        return Err("path must not contain a NUL byte".to_string());
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err("path must be relative".to_string());
    }
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err("path must not contain a parent-traversal segment".to_string());
    }
    if path == "." {
        return Err("path must not be empty".to_string());
    }
    Ok(())
}

fn validate_content_size(content: &str, field: &str, issues: &mut Vec<Issue>) {
    if content.len() > MAX_FILE_CONTENT_BYTES {
        issues.push(Issue::new(
            field,
            format!("content exceeds {MAX_FILE_CONTENT_BYTES} bytes"),
        ));
    }
}

/// Validate a single operation's field invariants (path/size/timeout).
/// Structural shape (which fields exist for which tag) is already enforced
/// by `serde` at deserialization time; this only checks the value-level
/// invariants spec.md calls out.
pub fn validate_operation(op: &Operation, field_prefix: &str) -> Result<(), ValidationError> {
    let mut issues = Vec::new();

    match op {
        Operation::Message { content, .. } => {
            if content.chars().count() > MAX_MESSAGE_CONTENT_CHARS {
                issues.push(Issue::new(
                    format!("{field_prefix}.content"),
                    format!("message content exceeds {MAX_MESSAGE_CONTENT_CHARS} characters"),
                ));
            }
        }
        Operation::CreateFile { path, content, .. } => {
            if let Err(message) = validate_path(path) {
                issues.push(Issue::new(format!("{field_prefix}.path"), message));
            }
            validate_content_size(content, &format!("{field_prefix}.content"), &mut issues);
        }
        Operation::ReadFile { path, .. } => {
            if let Err(message) = validate_path(path) {
                issues.push(Issue::new(format!("{field_prefix}.path"), message));
            }
        }
        Operation::EditFile { path, edits, .. } => {
            if let Err(message) = validate_path(path) {
                issues.push(Issue::new(format!("{field_prefix}.path"), message));
            }
            if edits.is_empty() {
                issues.push(Issue::new(
                    format!("{field_prefix}.edits"),
                    "edits must contain at least one entry".to_string(),
                ));
            }
        }
        Operation::DeleteFile { path, .. } => {
            if let Err(message) = validate_path(path) {
                issues.push(Issue::new(format!("{field_prefix}.path"), message));
            }
        }
        Operation::Shell {
            command,
            timeout_ms,
            ..
        } => {
            if command.chars().count() > MAX_SHELL_COMMAND_CHARS {
                issues.push(Issue::new(
                    format!("{field_prefix}.command"),
                    format!("command exceeds {MAX_SHELL_COMMAND_CHARS} characters"),
                ));
            }
            if let Some(timeout_ms) = timeout_ms
                && !(MIN_SHELL_TIMEOUT_MS..=MAX_SHELL_TIMEOUT_MS).contains(timeout_ms)
            {
                issues.push(Issue::new(
                    format!("{field_prefix}.timeout_ms"),
                    format!(
                        "timeout_ms must be between {MIN_SHELL_TIMEOUT_MS} and {MAX_SHELL_TIMEOUT_MS}"
                    ),
                ));
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { issues })
    }
}

/// The full batch envelope submitted for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationsMessage {
    pub protocol_version: String,
    pub operations: Vec<Operation>,
}

/// Validate an entire batch envelope: exact protocol version, then every
/// operation at its index.
pub fn validate_operations_message(
    message: &OperationsMessage,
) -> Result<(), ValidationError> {
    let mut issues = Vec::new();

    if message.protocol_version != PROTOCOL_VERSION {
        issues.push(Issue::new(
            "protocolVersion",
            format!("expected exactly \"{PROTOCOL_VERSION}\""),
        ));
    }

    for (index, op) in message.operations.iter().enumerate() {
        if let Err(err) = validate_operation(op, &format!("operations.{index}")) {
            issues.extend(err.issues);
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { issues })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Encoding;

    #[test]
    fn rejects_parent_traversal() {
        let err = validate_path("../escape.txt").unwrap_err();
        assert!(err.contains("traversal"));
    }

    #[test]
    fn rejects_leading_separator() {
        assert!(validate_path("/abs/path").is_err());
    }

    #[test]
    fn accepts_plain_relative_path() {
        assert!(validate_path("a/b/c.txt").is_ok());
    }

    #[test]
    fn envelope_validation_flags_path_traversal_scenario_s2() {
        let message = OperationsMessage {
            protocol_version: PROTOCOL_VERSION.to_string(),
            operations: vec![Operation::CreateFile {
                id: None,
                path: "../escape.txt".to_string(),
                content: "x".to_string(),
                encoding: Encoding::Utf8,
                overwrite: false,
            }],
        };
        let err = validate_operations_message(&message).unwrap_err();
        assert!(err.issues.iter().any(|i| i.path == "operations.0.path"));
    }

    #[test]
    fn edit_file_requires_at_least_one_edit() {
        let op = Operation::EditFile {
            id: None,
            path: "a.txt".to_string(),
            edits: vec![],
        };
        let err = validate_operation(&op, "operations.0").unwrap_err();
        assert_eq!(err.issues[0].path, "operations.0.edits");
    }

    #[test]
    fn shell_timeout_out_of_range_is_rejected() {
        let op = Operation::Shell {
            id: None,
            command: "echo hi".to_string(),
            cwd: None,
            timeout_ms: Some(500),
            env: None,
        };
        assert!(validate_operation(&op, "operations.0").is_err());
    }

    #[test]
    fn envelope_deserializes_camel_case_protocol_version_field() {
        let json = serde_json::json!({
            "protocolVersion": "1.0",
            "operations": [],
        });
        let message: OperationsMessage = serde_json::from_value(json).expect("parse");
        assert_eq!(message.protocol_version, "1.0");
    }

    #[test]
    fn wrong_protocol_version_is_rejected() {
        let message = OperationsMessage {
            protocol_version: "2.0".to_string(),
            operations: vec![],
        };
        let err = validate_operations_message(&message).unwrap_err();
        assert_eq!(err.issues[0].path, "protocolVersion");
    }
}
