//! Disk and subprocess reads feeding the context pack.
//!
//! Every reader degrades to `None` / empty instead of failing the turn.

use std::path::Path;

use tokio::process::Command;

/// Rule documents under `dir` (`*.md`, `*.mdc`), sorted by file name.
pub async fn read_rules(dir: &Path) -> Vec<(String, String)> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "rules directory unavailable");
            return Vec::new();
        }
    };

    let mut names: Vec<String> = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let name = entry.file_name().to_string_lossy().into_owned();
                let is_rule = name.ends_with(".md") || name.ends_with(".mdc");
                let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
                if is_rule && is_file {
                    names.push(name);
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "error while listing rules");
                break;
            }
        }
    }
    names.sort();

    let mut rules = Vec::with_capacity(names.len());
    for name in names {
        if let Some(content) = read_optional(&dir.join(&name)).await {
            rules.push((name, content));
        }
    }
    rules
}

/// Read a text file, normalising CRLF. Missing or unreadable → `None`.
pub async fn read_optional(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Some(raw.replace("\r\n", "\n")),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "context document unavailable");
            None
        }
    }
}

/// `git status -sb` in `root`. Any failure (no git, not a repo,
/// non-zero exit) yields `None`.
pub async fn git_status(root: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["status", "-sb"])
        .current_dir(root)
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            Some(String::from_utf8_lossy(&out.stdout).trim_end().to_string())
        }
        Ok(out) => {
            tracing::debug!(
                code = ?out.status.code(),
                stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                "git status failed"
            );
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "git not runnable");
            None
        }
    }
}
