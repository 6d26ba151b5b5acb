//! Workspace-local storage for uploaded submission files.
//!
//! Uploads are copied under `<workspace>/files/<folder>/` and named by a
//! SHA-256 prefix so a resubmission of identical bytes lands on the same path.
//! The returned `file_ref` is workspace-relative and always uses `/`.

use anyhow::{anyhow, Context};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

pub const FILES_DIR: &str = "files";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub file_ref: String,
    pub file_name: String,
}

pub fn store_file(
    workspace: &Path,
    folder: &str,
    source: &Path,
    display_name: Option<&str>,
) -> anyhow::Result<StoredFile> {
    let bytes = std::fs::read(source)
        .with_context(|| format!("failed to read upload {}", source.to_string_lossy()))?;

    let file_name = match display_name.map(str::trim).filter(|s| !s.is_empty()) {
        Some(n) => n.to_string(),
        None => source
            .file_name()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("upload path has no file name"))?,
    };

    let digest = sha256_hex(&bytes);
    let rel = format!(
        "{}/{}/{}-{}",
        FILES_DIR,
        sanitize(folder),
        &digest[..16],
        sanitize(&file_name)
    );
    let dest = workspace.join(&rel);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    std::fs::write(&dest, &bytes)
        .with_context(|| format!("failed to write {}", dest.to_string_lossy()))?;

    Ok(StoredFile {
        file_ref: rel,
        file_name,
    })
}

pub fn remove_file(workspace: &Path, file_ref: &str) -> anyhow::Result<()> {
    let path = resolve(workspace, file_ref)?;
    std::fs::remove_file(&path)
        .with_context(|| format!("failed to remove {}", path.to_string_lossy()))
}

/// Maps a stored `file_ref` back to a path, refusing anything outside `files/`.
pub fn resolve(workspace: &Path, file_ref: &str) -> anyhow::Result<PathBuf> {
    let rel = Path::new(file_ref);
    let inside = rel.starts_with(FILES_DIR)
        && rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if !inside {
        return Err(anyhow!("file reference escapes the file store: {file_ref}"));
    }
    Ok(workspace.join(rel))
}

/// True when `path` resolves to somewhere under `workspace`, symlinks included.
pub fn is_inside(workspace: &Path, path: &Path) -> anyhow::Result<bool> {
    let root = workspace
        .canonicalize()
        .with_context(|| format!("failed to resolve workspace {}", workspace.to_string_lossy()))?;
    let target = path
        .canonicalize()
        .with_context(|| format!("failed to resolve upload {}", path.to_string_lossy()))?;
    Ok(target.starts_with(root))
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}
