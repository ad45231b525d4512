//! Data model for per-space policy: the three preset configurations and the
//! shallow-merge override type. Evaluating a `Policy` against an `Operation`
//! lives in the sibling `spacehost-policy` crate; this module only owns the
//! shape of the data.

use serde::Deserialize;
use serde::Serialize;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetName {
    Restrictive,
    Standard,
    Permissive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesystemPolicy {
    pub enabled: bool,
    pub read_only: bool,
    pub max_file_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_paths: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_paths: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellPolicy {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_commands: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_patterns: Option<Vec<String>>,
    pub timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_required: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkPolicy {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_domains: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_domains: Option<Vec<String>>,
}

/// The fully resolved, immutable policy attached to a space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub filesystem: FilesystemPolicy,
    pub shell: ShellPolicy,
    pub network: NetworkPolicy,
}

impl Policy {
    pub fn restrictive() -> Self {
        Self {
            filesystem: FilesystemPolicy {
                enabled: true,
                read_only: true,
                max_file_size: MIB,
                allowed_paths: None,
                blocked_paths: None,
            },
            shell: ShellPolicy {
                enabled: false,
                allowed_commands: None,
                blocked_patterns: None,
                timeout_ms: 30_000,
                approval_required: None,
            },
            network: NetworkPolicy {
                enabled: false,
                allowed_domains: None,
                blocked_domains: None,
            },
        }
    }

    pub fn standard() -> Self {
        Self {
            filesystem: FilesystemPolicy {
                enabled: true,
                read_only: false,
                max_file_size: 10 * MIB,
                allowed_paths: None,
                blocked_paths: None,
            },
            shell: ShellPolicy {
                enabled: true,
                allowed_commands: Some(
                    [
                        "bun", "node", "npm", "npx", "cat", "echo", "ls", "pwd", "head", "tail",
                        "grep", "find", "wc",
                    ]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                ),
                blocked_patterns: Some(
                    [
                        "sudo", "chmod", "chown", "curl", "wget", "ssh", "rm -rf /", "rm -rf ~",
                    ]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                ),
                timeout_ms: 30_000,
                approval_required: Some(
                    ["rm -rf", "rm -r"].iter().map(|s| s.to_string()).collect(),
                ),
            },
            network: NetworkPolicy {
                enabled: false,
                allowed_domains: None,
                blocked_domains: None,
            },
        }
    }

    pub fn permissive() -> Self {
        Self {
            filesystem: FilesystemPolicy {
                enabled: true,
                read_only: false,
                max_file_size: 100 * MIB,
                allowed_paths: None,
                blocked_paths: None,
            },
            shell: ShellPolicy {
                enabled: true,
                allowed_commands: None,
                blocked_patterns: None,
                timeout_ms: 5 * 60 * 1000,
                approval_required: Some(
                    ["rm -rf", "chmod", "chown"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                ),
            },
            network: NetworkPolicy {
                enabled: true,
                allowed_domains: Some(vec!["*".to_string()]),
                blocked_domains: None,
            },
        }
    }

    pub fn preset(name: PresetName) -> Self {
        match name {
            PresetName::Restrictive => Self::restrictive(),
            PresetName::Standard => Self::standard(),
            PresetName::Permissive => Self::permissive(),
        }
    }
}

/// Shallow, field-by-field overrides merged over a preset. Scalars and
/// arrays at the leaf level replace the preset's value outright; they are
/// never concatenated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<FilesystemOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<ShellOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkOverrides>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilesystemOverrides {
    pub enabled: Option<bool>,
    pub read_only: Option<bool>,
    pub max_file_size: Option<u64>,
    pub allowed_paths: Option<Vec<String>>,
    pub blocked_paths: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShellOverrides {
    pub enabled: Option<bool>,
    pub allowed_commands: Option<Vec<String>>,
    pub blocked_patterns: Option<Vec<String>>,
    pub timeout_ms: Option<u64>,
    pub approval_required: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkOverrides {
    pub enabled: Option<bool>,
    pub allowed_domains: Option<Vec<String>>,
    pub blocked_domains: Option<Vec<String>>,
}

impl Policy {
    /// Build a policy from a preset with a one-level-deep merge of
    /// `overrides` applied on top.
    pub fn with_overrides(name: PresetName, overrides: &PolicyOverrides) -> Self {
        let mut policy = Self::preset(name);

        if let Some(fs) = &overrides.filesystem {
            if let Some(v) = fs.enabled {
                policy.filesystem.enabled = v;
            }
            if let Some(v) = fs.read_only {
                policy.filesystem.read_only = v;
            }
            if let Some(v) = fs.max_file_size {
                policy.filesystem.max_file_size = v;
            }
            if fs.allowed_paths.is_some() {
                policy.filesystem.allowed_paths = fs.allowed_paths.clone();
            }
            if fs.blocked_paths.is_some() {
                policy.filesystem.blocked_paths = fs.blocked_paths.clone();
            }
        }

        if let Some(shell) = &overrides.shell {
            if let Some(v) = shell.enabled {
                policy.shell.enabled = v;
            }
            if shell.allowed_commands.is_some() {
                policy.shell.allowed_commands = shell.allowed_commands.clone();
            }
            if shell.blocked_patterns.is_some() {
                policy.shell.blocked_patterns = shell.blocked_patterns.clone();
            }
            if let Some(v) = shell.timeout_ms {
                policy.shell.timeout_ms = v;
            }
            if shell.approval_required.is_some() {
                policy.shell.approval_required = shell.approval_required.clone();
            }
        }

        if let Some(net) = &overrides.network {
            if let Some(v) = net.enabled {
                policy.network.enabled = v;
            }
            if net.allowed_domains.is_some() {
                policy.network.allowed_domains = net.allowed_domains.clone();
            }
            if net.blocked_domains.is_some() {
                policy.network.blocked_domains = net.blocked_domains.clone();
            }
        }

        policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_preset_matches_spec_defaults() {
        let p = Policy::standard();
        assert!(!p.filesystem.read_only);
        assert_eq!(p.filesystem.max_file_size, 10 * MIB);
        assert!(p.shell.enabled);
        assert_eq!(p.shell.timeout_ms, 30_000);
        assert!(!p.network.enabled);
    }

    #[test]
    fn overrides_replace_leaf_arrays_rather_than_concatenate() {
        let overrides = PolicyOverrides {
            shell: Some(ShellOverrides {
                allowed_commands: Some(vec!["only-this".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let p = Policy::with_overrides(PresetName::Standard, &overrides);
        assert_eq!(
            p.shell.allowed_commands,
            Some(vec!["only-this".to_string()])
        );
        // Untouched fields retain the preset's values.
        assert_eq!(p.shell.timeout_ms, 30_000);
    }

    #[test]
    fn permissive_gates_destructive_commands_for_approval_not_denial() {
        let p = Policy::permissive();
        assert!(p.shell.blocked_patterns.is_none());
        assert_eq!(
            p.shell.approval_required,
            Some(vec![
                "rm -rf".to_string(),
                "chmod".to_string(),
                "chown".to_string()
            ])
        );
    }
}
