//! Local-checkout implementation of the inspection tools.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::Value;
use tokio::fs;

use crate::glob::PathGlob;
use crate::sandbox::{relative_display, sandbox_path};
use crate::text::{cap_lines, scan_content, SearchMatch};
use crate::{
    InspectLimits, ListDirectoryRequest, ReadFileRequest, RepoInspector, SearchFilesRequest,
    UsageSource,
};

/// Directories never descended into by `search_files`.
const SKIP_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "vendor",
    ".venv",
    "__pycache__",
];

/// Files above this size are not searched.
const MAX_SEARCH_FILE_BYTES: u64 = 1024 * 1024;

pub struct LocalRepo {
    root: PathBuf,
    limits: InspectLimits,
}

impl LocalRepo {
    pub fn new(root: impl Into<PathBuf>, limits: InspectLimits) -> Self {
        let root = root.into();
        Self {
            root: std::path::absolute(&root).unwrap_or(root),
            limits,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, requested: &str) -> Result<PathBuf, String> {
        sandbox_path(&self.root, requested)
            .ok_or_else(|| format!("path '{requested}' is outside the project root"))
    }
}

#[async_trait::async_trait]
impl RepoInspector for LocalRepo {
    fn source(&self) -> UsageSource {
        UsageSource::Local
    }

    async fn list_directory(&self, req: ListDirectoryRequest) -> Result<Value, String> {
        let path = self.resolve(&req.path)?;

        let mut read_dir = fs::read_dir(&path)
            .await
            .map_err(|e| format!("failed to read directory '{}': {e}", req.path))?;

        let mut entries: Vec<String> = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| format!("failed to read directory entry: {e}"))?
        {
            entries.push(entry.file_name().to_string_lossy().into_owned());
        }
        entries.sort();

        Ok(serde_json::json!({
            "path": relative_display(&self.root, &path),
            "entries": entries,
        }))
    }

    async fn read_file(&self, req: ReadFileRequest) -> Result<Value, String> {
        let path = self.resolve(&req.path)?;

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| format!("failed to read '{}': {e}", req.path))?;

        let max = self.limits.line_cap(req.max_lines);
        let (content, omitted) = cap_lines(&content, max);

        Ok(serde_json::json!({
            "path": relative_display(&self.root, &path),
            "content": content,
            "truncated": omitted > 0,
        }))
    }

    async fn search_files(&self, req: SearchFilesRequest) -> Result<Value, String> {
        let re = Regex::new(&req.pattern).map_err(|e| format!("invalid regex: {e}"))?;
        let glob = req.glob.as_deref().filter(|g| !g.trim().is_empty());
        let path_glob = glob
            .map(PathGlob::new)
            .transpose()
            .map_err(|e| format!("invalid glob: {e}"))?;

        let root = self.root.clone();
        let limits = self.limits;
        let matches = tokio::task::spawn_blocking(move || {
            let mut matches = Vec::new();
            walk(&root, &root, &re, path_glob.as_ref(), &limits, &mut matches);
            matches
        })
        .await
        .map_err(|e| format!("search task failed: {e}"))?;

        let truncated = matches.len() >= self.limits.search_max_matches;
        Ok(serde_json::json!({
            "pattern": req.pattern,
            "glob": glob,
            "matches": matches,
            "truncated": truncated,
        }))
    }
}

/// Depth-first walk in sorted order. Returns `true` once the match cap is hit.
fn walk(
    root: &Path,
    dir: &Path,
    re: &Regex,
    glob: Option<&PathGlob>,
    limits: &InspectLimits,
    matches: &mut Vec<SearchMatch>,
) -> bool {
    let mut entries: Vec<std::fs::DirEntry> = match std::fs::read_dir(dir) {
        Ok(rd) => rd.filter_map(|e| e.ok()).collect(),
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
            return false;
        }
    };
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();
        if file_type.is_dir() {
            let name = entry.file_name();
            if SKIP_DIRS.iter().any(|s| name == *s) {
                continue;
            }
            if walk(root, &path, re, glob, limits, matches) {
                return true;
            }
        } else if file_type.is_file() {
            let rel = relative_display(root, &path);
            if glob.is_some_and(|g| !g.is_match(&rel)) {
                continue;
            }
            if entry.metadata().map(|m| m.len()).unwrap_or(0) > MAX_SEARCH_FILE_BYTES {
                continue;
            }
            // Binary / non-UTF-8 files fail here and are skipped.
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            if scan_content(
                &rel,
                &content,
                re,
                limits.search_max_matches,
                limits.search_text_max_chars,
                matches,
            ) {
                return true;
            }
        }
    }
    false
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo() -> (TempDir, LocalRepo) {
        let ws = TempDir::new().expect("failed to create temp dir");
        let repo = LocalRepo::new(ws.path(), InspectLimits::default());
        (ws, repo)
    }

    #[tokio::test]
    async fn list_directory_is_sorted() {
        let (ws, repo) = repo();
        std::fs::write(ws.path().join("b.txt"), "").unwrap();
        std::fs::write(ws.path().join("a.txt"), "").unwrap();
        std::fs::create_dir(ws.path().join("src")).unwrap();

        let out = repo
            .list_directory(ListDirectoryRequest { path: ".".into() })
            .await
            .unwrap();
        assert_eq!(out["entries"], serde_json::json!(["a.txt", "b.txt", "src"]));
        assert_eq!(out["path"], ".");
    }

    #[tokio::test]
    async fn list_directory_rejects_escape_and_missing() {
        let (_ws, repo) = repo();
        let err = repo
            .list_directory(ListDirectoryRequest { path: "../..".into() })
            .await
            .unwrap_err();
        assert!(err.contains("outside the project root"));

        let err = repo
            .list_directory(ListDirectoryRequest { path: "nope".into() })
            .await
            .unwrap_err();
        assert!(err.contains("failed to read directory"));
    }

    #[tokio::test]
    async fn read_file_caps_lines() {
        let (ws, repo) = repo();
        let body: String = (1..=600).map(|i| format!("line {i}\n")).collect();
        std::fs::write(ws.path().join("big.txt"), body).unwrap();

        let out = repo
            .read_file(ReadFileRequest { path: "big.txt".into(), max_lines: None })
            .await
            .unwrap();
        let content = out["content"].as_str().unwrap();
        assert!(content.contains("line 500"));
        assert!(!content.contains("line 501"));
        assert!(content.ends_with("(100 more lines omitted)"));
        assert_eq!(out["truncated"], true);

        let out = repo
            .read_file(ReadFileRequest { path: "big.txt".into(), max_lines: Some(10_000) })
            .await
            .unwrap();
        assert!(!out["content"].as_str().unwrap().contains("line 501"));
    }

    #[tokio::test]
    async fn read_file_with_zero_cap_returns_one_line() {
        let ws = TempDir::new().unwrap();
        let limits = InspectLimits { read_file_max_lines: 0, ..InspectLimits::default() };
        let repo = LocalRepo::new(ws.path(), limits);
        std::fs::write(ws.path().join("notes.md"), "first\nsecond\nthird\n").unwrap();

        let out = repo
            .read_file(ReadFileRequest { path: "notes.md".into(), max_lines: Some(0) })
            .await
            .unwrap();
        let content = out["content"].as_str().unwrap();
        assert!(content.starts_with("first"));
        assert!(!content.contains("second"));
        assert_eq!(out["truncated"], true);
    }

    #[tokio::test]
    async fn read_file_missing_is_error() {
        let (_ws, repo) = repo();
        assert!(repo
            .read_file(ReadFileRequest { path: "missing.md".into(), max_lines: None })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn search_respects_glob_and_line_numbers() {
        let (ws, repo) = repo();
        std::fs::create_dir_all(ws.path().join("docs")).unwrap();
        std::fs::write(ws.path().join("README.md"), "intro\nTODO: write docs\n").unwrap();
        std::fs::write(ws.path().join("docs/plan.md"), "a\nb\nc TODO later\n").unwrap();
        std::fs::write(ws.path().join("main.rs"), "// TODO in code\n").unwrap();

        let out = repo
            .search_files(SearchFilesRequest {
                pattern: "TODO".into(),
                glob: Some("**/*.md".into()),
            })
            .await
            .unwrap();
        let matches = out["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0]["path"], "README.md");
        assert_eq!(matches[0]["line"], 2);
        assert_eq!(matches[1]["path"], "docs/plan.md");
        assert_eq!(matches[1]["line"], 3);
        assert_eq!(matches[1]["text"], "c TODO later");
    }

    #[tokio::test]
    async fn search_skips_dependency_dirs() {
        let (ws, repo) = repo();
        std::fs::create_dir_all(ws.path().join("node_modules/pkg")).unwrap();
        std::fs::write(ws.path().join("node_modules/pkg/index.js"), "needle\n").unwrap();
        std::fs::write(ws.path().join("app.js"), "needle\n").unwrap();

        let out = repo
            .search_files(SearchFilesRequest { pattern: "needle".into(), glob: None })
            .await
            .unwrap();
        let matches = out["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["path"], "app.js");
    }

    #[tokio::test]
    async fn search_caps_matches() {
        let (ws, repo) = repo();
        let body: String = (0..150).map(|_| "hit\n").collect();
        std::fs::write(ws.path().join("many.txt"), body).unwrap();

        let out = repo
            .search_files(SearchFilesRequest { pattern: "hit".into(), glob: None })
            .await
            .unwrap();
        assert_eq!(out["matches"].as_array().unwrap().len(), 100);
        assert_eq!(out["truncated"], true);
    }

    #[tokio::test]
    async fn invalid_regex_is_error_value() {
        let (_ws, repo) = repo();
        let err = repo
            .search_files(SearchFilesRequest { pattern: "([".into(), glob: None })
            .await
            .unwrap_err();
        assert!(err.starts_with("invalid regex"));
    }
}
