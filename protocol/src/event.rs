use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::operation::Encoding;

/// Taxonomy for the catch-all `error` event (see `ErrorCategory`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Validation,
    Policy,
    Execution,
    Timeout,
    System,
}

/// The op-specific details attached to an `approvalRequired` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

/// The recorded outcome of an executed, denied, or gated operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventKind {
    Message {
        #[serde(default = "default_true")]
        success: bool,
    },
    CreateFile {
        path: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        bytes_written: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ReadFile {
        path: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        encoding: Option<Encoding>,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    EditFile {
        path: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        edits_applied: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    DeleteFile {
        path: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Shell {
        command: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stdout: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stderr: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        #[serde(default)]
        timed_out: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ApprovalRequired {
        operation_id: Option<String>,
        operation_type: String,
        reason: String,
        details: ApprovalDetails,
    },
    PolicyDenied {
        operation_type: String,
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        suggestion: Option<String>,
    },
    Error {
        category: ErrorCategory,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    },
}

fn default_true() -> bool {
    true
}

impl EventKind {
    pub fn type_tag(&self) -> &'static str {
        match self {
            EventKind::Message { .. } => "message",
            EventKind::CreateFile { .. } => "createFile",
            EventKind::ReadFile { .. } => "readFile",
            EventKind::EditFile { .. } => "editFile",
            EventKind::DeleteFile { .. } => "deleteFile",
            EventKind::Shell { .. } => "shell",
            EventKind::ApprovalRequired { .. } => "approvalRequired",
            EventKind::PolicyDenied { .. } => "policyDenied",
            EventKind::Error { .. } => "error",
        }
    }

    pub fn success(&self) -> Option<bool> {
        match self {
            EventKind::Message { success }
            | EventKind::CreateFile { success, .. }
            | EventKind::ReadFile { success, .. }
            | EventKind::EditFile { success, .. }
            | EventKind::DeleteFile { success, .. }
            | EventKind::Shell { success, .. } => Some(*success),
            EventKind::ApprovalRequired { .. }
            | EventKind::PolicyDenied { .. }
            | EventKind::Error { .. } => None,
        }
    }
}

/// One entry in a run's event list: the timestamped, correlated outcome of a
/// single evaluated operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(kind: EventKind, operation_id: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation_id,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn message_event_defaults_success_true() {
        let json = serde_json::json!({
            "type": "message",
            "timestamp": "2026-01-01T00:00:00Z",
        });
        let event: Event = serde_json::from_value(json).expect("parse");
        assert_eq!(event.kind.success(), Some(true));
    }

    #[test]
    fn round_trip_preserves_operation_id_and_tag() {
        let event = Event::new(
            EventKind::PolicyDenied {
                operation_type: "shell".to_string(),
                reason: "blocked".to_string(),
                suggestion: None,
            },
            Some("op1".to_string()),
        );
        let json = serde_json::to_value(&event).expect("serialize");
        let back: Event = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.operation_id.as_deref(), Some("op1"));
        assert_eq!(back.kind.type_tag(), "policyDenied");
    }
}
