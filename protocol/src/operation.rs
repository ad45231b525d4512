use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

/// How `content` bytes are encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    Base64,
}

/// A single find/replace step within an `editFile` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub old_content: String,
    pub new_content: String,
}

fn default_false() -> bool {
    false
}

/// One instruction submitted as part of a run. Mirrors the six closed
/// variants from the protocol's wire schema; unknown variants are rejected at
/// the validation boundary rather than accepted here as a catch-all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Operation {
    Message {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        content: String,
    },
    CreateFile {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        path: String,
        content: String,
        #[serde(default)]
        encoding: Encoding,
        #[serde(default = "default_false")]
        overwrite: bool,
    },
    ReadFile {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        path: String,
        #[serde(default)]
        encoding: Encoding,
    },
    EditFile {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        path: String,
        edits: Vec<Edit>,
    },
    DeleteFile {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        path: String,
    },
    Shell {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        command: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cwd: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        env: Option<HashMap<String, String>>,
    },
}

impl Operation {
    /// The caller-supplied correlation id, if any.
    pub fn id(&self) -> Option<&str> {
        match self {
            Operation::Message { id, .. }
            | Operation::CreateFile { id, .. }
            | Operation::ReadFile { id, .. }
            | Operation::EditFile { id, .. }
            | Operation::DeleteFile { id, .. }
            | Operation::Shell { id, .. } => id.as_deref(),
        }
    }

    /// Short, stable tag used in events and policy decisions
    /// (`"message"`, `"createFile"`, ...).
    pub fn type_tag(&self) -> &'static str {
        match self {
            Operation::Message { .. } => "message",
            Operation::CreateFile { .. } => "createFile",
            Operation::ReadFile { .. } => "readFile",
            Operation::EditFile { .. } => "editFile",
            Operation::DeleteFile { .. } => "deleteFile",
            Operation::Shell { .. } => "shell",
        }
    }

    /// The filesystem path this operation touches, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Operation::CreateFile { path, .. }
            | Operation::ReadFile { path, .. }
            | Operation::EditFile { path, .. }
            | Operation::DeleteFile { path, .. } => Some(path),
            Operation::Message { .. } | Operation::Shell { .. } => None,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Operation::CreateFile { .. } | Operation::EditFile { .. } | Operation::DeleteFile { .. }
        )
    }

    pub fn is_filesystem(&self) -> bool {
        matches!(
            self,
            Operation::CreateFile { .. }
                | Operation::ReadFile { .. }
                | Operation::EditFile { .. }
                | Operation::DeleteFile { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn create_file_defaults_encoding_and_overwrite() {
        let json = serde_json::json!({
            "type": "createFile",
            "path": "a.txt",
            "content": "hi",
        });
        let op: Operation = serde_json::from_value(json).expect("parse");
        match op {
            Operation::CreateFile {
                encoding, overwrite, ..
            } => {
                assert_eq!(encoding, Encoding::Utf8);
                assert!(!overwrite);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn round_trip_preserves_semantic_fields() {
        let op = Operation::Shell {
            id: Some("op1".to_string()),
            command: "echo hi".to_string(),
            cwd: None,
            timeout_ms: Some(5_000),
            env: None,
        };
        let json = serde_json::to_value(&op).expect("serialize");
        let back: Operation = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.id(), Some("op1"));
        assert_eq!(back.type_tag(), "shell");
    }
}
