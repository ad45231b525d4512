//! File operations against the host-side bind-mounted workspace directory.
//! The workspace is trivially host-reachable (it is the very directory bind
//! mounted into the container), so `createFile`/`readFile`/`editFile`/
//! `deleteFile`/`listFiles` never need to go through `docker exec`; only
//! `shell` does.

use std::path::Path;
use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use spacehost_protocol::Encoding;
use spacehost_protocol::EventKind;

/// Resolves `path` (a workspace-relative path as carried on the wire) against
/// `workspace_root`, rejecting anything that would escape it. Mirrors the
/// protocol-level `validate_path` checks but additionally guards against a
/// `..` that validation missed -- e.g. a path that is syntactically clean but
/// whose resolved components still climb out, on platforms where `/` is not
/// the only separator.
fn resolve_within(workspace_root: &Path, path: &str) -> Result<PathBuf, String> {
    let relative = path.trim_start_matches('/');
    let joined = workspace_root.join(relative);

    let mut depth: i64 = 0;
    for component in Path::new(relative).components() {
        use std::path::Component;
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return Err(format!("path escapes workspace: {path}"));
                }
            }
            Component::RootDir | Component::Prefix(_) => {}
        }
    }
    Ok(joined)
}

fn decode_content(content: &str, encoding: Encoding) -> Result<Vec<u8>, String> {
    match encoding {
        Encoding::Utf8 => Ok(content.as_bytes().to_vec()),
        Encoding::Base64 => BASE64
            .decode(content)
            .map_err(|e| format!("invalid base64 content: {e}")),
    }
}

fn encode_content(bytes: &[u8], encoding: Encoding) -> Result<String, String> {
    match encoding {
        Encoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| format!("file is not valid utf-8: {e}")),
        Encoding::Base64 => Ok(BASE64.encode(bytes)),
    }
}

pub async fn create_file(
    workspace_root: &Path,
    path: &str,
    content: &str,
    encoding: Encoding,
    overwrite: bool,
) -> EventKind {
    let target = match resolve_within(workspace_root, path) {
        Ok(p) => p,
        Err(error) => {
            return EventKind::CreateFile {
                path: path.to_string(),
                success: false,
                bytes_written: None,
                error: Some(error),
            };
        }
    };

    if !overwrite && tokio::fs::try_exists(&target).await.unwrap_or(false) {
        return EventKind::CreateFile {
            path: path.to_string(),
            success: false,
            bytes_written: None,
            error: Some(format!("{path} already exists and overwrite is false")),
        };
    }

    let bytes = match decode_content(content, encoding) {
        Ok(b) => b,
        Err(error) => {
            return EventKind::CreateFile {
                path: path.to_string(),
                success: false,
                bytes_written: None,
                error: Some(error),
            };
        }
    };

    if let Some(parent) = target.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            return EventKind::CreateFile {
                path: path.to_string(),
                success: false,
                bytes_written: None,
                error: Some(format!("failed to create parent directories: {e}")),
            };
        }
    }

    match tokio::fs::write(&target, &bytes).await {
        Ok(()) => EventKind::CreateFile {
            path: path.to_string(),
            success: true,
            bytes_written: Some(bytes.len() as u64),
            error: None,
        },
        Err(e) => EventKind::CreateFile {
            path: path.to_string(),
            success: false,
            bytes_written: None,
            error: Some(e.to_string()),
        },
    }
}

pub async fn read_file(workspace_root: &Path, path: &str, encoding: Encoding) -> EventKind {
    let target = match resolve_within(workspace_root, path) {
        Ok(p) => p,
        Err(error) => {
            return EventKind::ReadFile {
                path: path.to_string(),
                success: false,
                content: None,
                encoding: None,
                size: None,
                error: Some(error),
            };
        }
    };

    match tokio::fs::read(&target).await {
        Ok(bytes) => match encode_content(&bytes, encoding) {
            Ok(encoded) => EventKind::ReadFile {
                path: path.to_string(),
                success: true,
                content: Some(encoded),
                encoding: Some(encoding),
                size: Some(bytes.len() as u64),
                error: None,
            },
            Err(error) => EventKind::ReadFile {
                path: path.to_string(),
                success: false,
                content: None,
                encoding: None,
                size: None,
                error: Some(error),
            },
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

/// Applies each edit's find/replace against the file in order, replacing only
/// the first occurrence of `old_content` per edit. An edit whose `old_content`
/// is not found fails the whole operation without writing anything back.
pub async fn edit_file(workspace_root: &Path, path: &str, edits: &[spacehost_protocol::Edit]) -> EventKind {
    let target = match resolve_within(workspace_root, path) {
        Ok(p) => p,
        Err(error) => {
            return EventKind::EditFile {
                path: path.to_string(),
                success: false,
                edits_applied: None,
                error: Some(error),
            };
        }
    };

    let original = match tokio::fs::read_to_string(&target).await {
        Ok(s) => s,
        Err(e) => {
            return EventKind::EditFile {
                path: path.to_string(),
                success: false,
                edits_applied: None,
                error: Some(e.to_string()),
            };
        }
    };

    let mut current = original;
    let mut applied = 0usize;
    for edit in edits {
        match current.find(&edit.old_content) {
            Some(index) => {
                current.replace_range(index..index + edit.old_content.len(), &edit.new_content);
                applied += 1;
            }
            None => {
                let probe: String = edit.old_content.chars().take(50).collect();
                return EventKind::EditFile {
                    path: path.to_string(),
                    success: false,
                    edits_applied: Some(applied),
                    error: Some(format!("edit {applied} did not match any content in {path}: {probe:?}")),
                };
            }
        }
    }

    match tokio::fs::write(&target, current).await {
        Ok(()) => EventKind::EditFile {
            path: path.to_string(),
            success: true,
            edits_applied: Some(applied),
            error: None,
        },
        Err(e) => EventKind::EditFile {
            path: path.to_string(),
            success: false,
            edits_applied: Some(applied),
            error: Some(e.to_string()),
        },
    }
}

pub async fn delete_file(workspace_root: &Path, path: &str) -> EventKind {
    let target = match resolve_within(workspace_root, path) {
        Ok(p) => p,
        Err(error) => {
            return EventKind::DeleteFile {
                path: path.to_string(),
                success: false,
                error: Some(error),
            };
        }
    };

    match tokio::fs::remove_file(&target).await {
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

/// One entry returned by `list_files`: a file or directory under the
/// workspace, relative to its root.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub is_directory: bool,
    pub modified_at: chrono::DateTime<chrono::Utc>,
}

/// Lists entries under `workspace_root/rel_dir`, relative to `workspace_root`.
/// Not driven by any wire `Operation` -- a host-side convenience exposed
/// directly on `Sandbox` for callers (and the demo CLI) that want to inspect
/// a run's resulting workspace state. A missing directory returns an empty
/// list rather than an error. When `recursive` is true, descends
/// depth-first, pre-order: each directory entry is emitted before its
/// children are visited.
pub async fn list_files(workspace_root: &Path, rel_dir: &str, recursive: bool) -> Result<Vec<FileEntry>, String> {
    let start = match resolve_within(workspace_root, rel_dir) {
        Ok(p) => p,
        Err(error) => return Err(error),
    };
    if !tokio::fs::try_exists(&start).await.unwrap_or(false) {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    list_dir_preorder(workspace_root, &start, recursive, &mut out).await?;
    Ok(out)
}

fn list_dir_preorder<'a>(
    workspace_root: &'a Path,
    dir: &'a Path,
    recursive: bool,
    out: &'a mut Vec<FileEntry>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), String>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| format!("failed to read {}: {e}", dir.display()))?;
        let mut children = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| format!("failed to iterate {}: {e}", dir.display()))?
        {
            children.push(entry);
        }
        children.sort_by_key(|e| e.file_name());

        for entry in children {
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| format!("failed to stat {}: {e}", entry.path().display()))?;
            let relative = entry
                .path()
                .strip_prefix(workspace_root)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| entry.path().to_string_lossy().into_owned());
            let modified_at = metadata
                .modified()
                .ok()
                .map(chrono::DateTime::<chrono::Utc>::from)
                .unwrap_or_else(|| chrono::DateTime::<chrono::Utc>::from(std::time::UNIX_EPOCH));

            let is_directory = metadata.is_dir();
            out.push(FileEntry {
                path: relative,
                size: metadata.len(),
                is_directory,
                modified_at,
            });

            if is_directory && recursive {
                list_dir_preorder(workspace_root, &entry.path(), recursive, out).await?;
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use spacehost_protocol::Edit;

    #[tokio::test]
    async fn create_file_refuses_overwrite_by_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        let first = create_file(root, "a.txt", "one", Encoding::Utf8, false).await;
        assert_eq!(first.success(), Some(true));
        let second = create_file(root, "a.txt", "two", Encoding::Utf8, false).await;
        assert_eq!(second.success(), Some(false));
    }

    #[tokio::test]
    async fn edit_file_replaces_first_occurrence_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        create_file(root, "a.txt", "foo foo foo", Encoding::Utf8, false)
            .await;
        let edits = vec![Edit {
            old_content: "foo".to_string(),
            new_content: "bar".to_string(),
        }];
        let event = edit_file(root, "a.txt", &edits).await;
        assert_eq!(event.success(), Some(true));
        let contents = tokio::fs::read_to_string(root.join("a.txt")).await.expect("read");
        assert_eq!(contents, "bar foo foo");
    }

    #[tokio::test]
    async fn path_escaping_workspace_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        let event = read_file(root, "../../etc/passwd", Encoding::Utf8).await;
        assert_eq!(event.success(), Some(false));
    }

    #[tokio::test]
    async fn list_files_lists_directories_before_descending_into_them() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        create_file(root, "b.txt", "b", Encoding::Utf8, false).await;
        create_file(root, "sub/a.txt", "a", Encoding::Utf8, false).await;
        let entries = list_files(root, "", true).await.expect("list");
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["b.txt", "sub", "sub/a.txt"]);
        assert!(!entries[0].is_directory);
        assert!(entries[1].is_directory);
    }

    #[tokio::test]
    async fn list_files_non_recursive_does_not_descend() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        create_file(root, "b.txt", "b", Encoding::Utf8, false).await;
        create_file(root, "sub/a.txt", "a", Encoding::Utf8, false).await;
        let entries = list_files(root, "", false).await.expect("list");
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["b.txt", "sub"]);
    }

    #[tokio::test]
    async fn list_files_on_missing_directory_returns_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let entries = list_files(dir.path(), "does-not-exist", true).await.expect("list");
        assert!(entries.is_empty());
    }
}
