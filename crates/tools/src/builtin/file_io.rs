//! File tools: `file_read`, `file_write`, `create_file`, `delete_file`
//! (§4.5 tool mapping table). Every path is validated against the
//! configured workspace root before touching the filesystem.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Deserialize)]
pub struct FileReadRequest {
    pub path: String,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileWriteRequest {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFileRequest {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileDeleteRequest {
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListDirRequest {
    #[serde(default = "default_dot")]
    pub path: String,
}

fn default_dot() -> String {
    ".".into()
}

/// Reject `..` components and absolute paths, then confirm the resolved
/// path is still contained within the workspace root.
pub fn validate_path(workspace_root: &Path, requested: &str) -> Result<PathBuf, String> {
    let requested_path = Path::new(requested);
    if requested_path.is_absolute() {
        return Err(format!("absolute paths are not allowed (got '{requested}')"));
    }
    for component in requested_path.components() {
        if matches!(component, Component::ParentDir) {
            return Err("path must not contain '..' components".to_owned());
        }
    }

    let canonical_root = workspace_root
        .canonicalize()
        .map_err(|e| format!("cannot resolve workspace root '{}': {e}", workspace_root.display()))?;

    let candidate = canonical_root.join(requested_path);

    let resolved = if candidate.exists() {
        candidate
            .canonicalize()
            .map_err(|e| format!("cannot resolve path '{}': {e}", candidate.display()))?
    } else {
        let mut existing = candidate.as_path();
        let mut tail_parts: Vec<&std::ffi::OsStr> = Vec::new();
        loop {
            if existing.exists() {
                break;
            }
            match existing.parent() {
                Some(parent) => {
                    if let Some(file_name) = existing.file_name() {
                        tail_parts.push(file_name);
                    }
                    existing = parent;
                }
                None => break,
            }
        }
        let mut resolved = existing
            .canonicalize()
            .map_err(|e| format!("cannot resolve ancestor of '{}': {e}", candidate.display()))?;
        for part in tail_parts.into_iter().rev() {
            resolved.push(part);
        }
        resolved
    };

    if !resolved.starts_with(&canonical_root) {
        return Err(format!(
            "path '{}' resolves outside workspace root '{}'",
            requested,
            canonical_root.display()
        ));
    }

    Ok(resolved)
}

pub async fn file_read(workspace_root: &Path, req: FileReadRequest) -> Result<Value, String> {
    let path = validate_path(workspace_root, &req.path)?;
    let content = fs::read_to_string(&path)
        .await
        .map_err(|e| format!("failed to read '{}': {e}", path.display()))?;

    let lines: Vec<&str> = content.lines().collect();
    let total_lines = lines.len();
    let offset = req.offset.unwrap_or(0);
    let limit = req.limit.unwrap_or(total_lines.saturating_sub(offset));
    let selected: Vec<&str> = lines.into_iter().skip(offset).take(limit).collect();

    Ok(serde_json::json!({
        "path": req.path,
        "content": selected.join("\n"),
        "total_lines": total_lines,
        "offset": offset,
        "lines_returned": selected.len(),
    }))
}

async fn write_atomic(path: &Path, content: &str) -> Result<usize, String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("failed to create parent directory: {e}"))?;
    }

    let tmp_name = format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        uuid::Uuid::new_v4().as_simple()
    );
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp_path)
        .await
        .map_err(|e| format!("failed to create temp file '{}': {e}", tmp_path.display()))?;
    file.write_all(content.as_bytes())
        .await
        .map_err(|e| format!("failed to write temp file: {e}"))?;
    file.flush().await.map_err(|e| format!("failed to flush temp file: {e}"))?;
    file.sync_data().await.map_err(|e| format!("failed to sync temp file: {e}"))?;

    fs::rename(&tmp_path, path).await.map_err(|e| {
        let tmp = tmp_path.clone();
        tokio::spawn(async move { let _ = fs::remove_file(&tmp).await; });
        format!("failed to rename temp file into place: {e}")
    })?;

    Ok(content.len())
}

pub async fn file_write(workspace_root: &Path, req: FileWriteRequest) -> Result<Value, String> {
    let path = validate_path(workspace_root, &req.path)?;
    let bytes_written = write_atomic(&path, &req.content).await?;
    Ok(serde_json::json!({ "path": req.path, "bytes_written": bytes_written, "success": true }))
}

/// `create_file` is `file_write`'s create-if-absent variant — it refuses to
/// overwrite an existing file (§4.5 tool mapping table).
pub async fn create_file(workspace_root: &Path, req: CreateFileRequest) -> Result<Value, String> {
    let path = validate_path(workspace_root, &req.path)?;
    if path.exists() {
        return Err(format!("'{}' already exists; use file_write to overwrite", req.path));
    }
    let bytes_written = write_atomic(&path, &req.content).await?;
    Ok(serde_json::json!({ "path": req.path, "bytes_written": bytes_written, "success": true }))
}

pub async fn file_delete(workspace_root: &Path, req: FileDeleteRequest) -> Result<Value, String> {
    let path = validate_path(workspace_root, &req.path)?;
    let metadata = fs::metadata(&path)
        .await
        .map_err(|e| format!("failed to stat '{}': {e}", req.path))?;

    if metadata.is_dir() {
        fs::remove_dir(&path)
            .await
            .map_err(|e| format!("failed to remove directory '{}' (must be empty): {e}", req.path))?;
    } else {
        fs::remove_file(&path)
            .await
            .map_err(|e| format!("failed to remove file '{}': {e}", req.path))?;
    }

    Ok(serde_json::json!({ "path": req.path, "success": true }))
}

pub async fn list_dir(workspace_root: &Path, req: ListDirRequest) -> Result<Value, String> {
    let path = validate_path(workspace_root, &req.path)?;
    let mut read_dir = fs::read_dir(&path)
        .await
        .map_err(|e| format!("failed to read directory '{}': {e}", req.path))?;

    let mut entries: Vec<DirEntry> = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| format!("failed to read directory entry: {e}"))?
    {
        let metadata = entry
            .metadata()
            .await
            .map_err(|e| format!("failed to read metadata for '{}': {e}", entry.path().display()))?;
        entries.push(DirEntry {
            name: entry.file_name().to_string_lossy().to_string(),
            size: metadata.len(),
            is_dir: metadata.is_dir(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(serde_json::json!({ "path": req.path, "entries": entries, "count": entries.len() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_workspace() -> TempDir {
        TempDir::new().expect("failed to create temp dir")
    }

    #[test]
    fn validate_path_rejects_parent_traversal() {
        let ws = tmp_workspace();
        assert!(validate_path(ws.path(), "../etc/passwd").is_err());
    }

    #[test]
    fn validate_path_rejects_absolute_path() {
        let ws = tmp_workspace();
        let abs_path = if cfg!(windows) { "C:\\Windows\\System32" } else { "/etc/passwd" };
        assert!(validate_path(ws.path(), abs_path).is_err());
    }

    #[tokio::test]
    async fn file_write_and_read_roundtrip() {
        let ws = tmp_workspace();
        file_write(ws.path(), FileWriteRequest { path: "test.txt".into(), content: "hello\nworld".into() })
            .await
            .unwrap();

        let result = file_read(ws.path(), FileReadRequest { path: "test.txt".into(), offset: None, limit: None })
            .await
            .unwrap();
        assert_eq!(result["content"].as_str().unwrap(), "hello\nworld");
        assert_eq!(result["total_lines"].as_u64().unwrap(), 2);
    }

    #[tokio::test]
    async fn create_file_refuses_to_overwrite_existing() {
        let ws = tmp_workspace();
        create_file(ws.path(), CreateFileRequest { path: "a.txt".into(), content: "one".into() })
            .await
            .unwrap();
        let err = create_file(ws.path(), CreateFileRequest { path: "a.txt".into(), content: "two".into() })
            .await
            .unwrap_err();
        assert!(err.contains("already exists"));
    }

    #[tokio::test]
    async fn file_delete_removes_file() {
        let ws = tmp_workspace();
        file_write(ws.path(), FileWriteRequest { path: "doomed.txt".into(), content: "bye".into() })
            .await
            .unwrap();
        file_delete(ws.path(), FileDeleteRequest { path: "doomed.txt".into() }).await.unwrap();
        assert!(!ws.path().join("doomed.txt").exists());
    }

    #[tokio::test]
    async fn list_dir_returns_sorted_entries() {
        let ws = tmp_workspace();
        std::fs::write(ws.path().join("b.txt"), "bb").unwrap();
        std::fs::write(ws.path().join("a.txt"), "aa").unwrap();

        let result = list_dir(ws.path(), ListDirRequest { path: ".".into() }).await.unwrap();
        let entries = result["entries"].as_array().unwrap();
        assert_eq!(entries[0]["name"], "a.txt");
        assert_eq!(entries[1]["name"], "b.txt");
    }
}
