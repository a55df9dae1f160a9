//! Lexical path sandbox.
//!
//! [`sandbox_path`] joins a requested path onto the project root and
//! normalises `.` / `..` without touching the filesystem. Anything whose
//! relative form escapes the root is refused.

use std::path::{Component, Path, PathBuf};

/// Resolve `requested` (relative or absolute) against `root`.
///
/// Returns `None` when the resolved path is outside `root`.
pub fn sandbox_path(root: &Path, requested: &str) -> Option<PathBuf> {
    let root = absolute(root)?;
    let requested = Path::new(requested.trim());
    let candidate = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        root.join(requested)
    };
    let resolved = normalize(&candidate);
    resolved.strip_prefix(&root).ok()?;
    Some(resolved)
}

/// The `/`-separated form of `path` relative to `root` (`.` for the root).
pub fn relative_display(root: &Path, path: &Path) -> String {
    let root = absolute(root).unwrap_or_else(|| root.to_path_buf());
    let rel = path.strip_prefix(&root).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        ".".into()
    } else {
        parts.join("/")
    }
}

fn absolute(path: &Path) -> Option<PathBuf> {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::path::absolute(path).ok()?
    };
    Some(normalize(&abs))
}

/// Collapse `.` and `..` components lexically. `..` at the filesystem
/// root is dropped.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                );
                if !at_root {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
