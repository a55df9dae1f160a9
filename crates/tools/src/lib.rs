//! Read-only repository inspection tools.
//!
//! `list_directory`, `read_file` and `search_files` run either against the
//! local checkout ([`LocalRepo`], sandboxed to the project root) or against
//! the GitHub contents/search API ([`GithubRepo`]) for a connected project.
//! Failures are returned as `Err(String)` so callers can hand them to the
//! model as data.

pub mod github;
pub mod glob;
pub mod local;
pub mod sandbox;
pub mod text;

pub use github::GithubRepo;
pub use local::LocalRepo;
pub use sandbox::sandbox_path;

use pm_domain::config::ContextConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
pub struct ListDirectoryRequest {
    #[serde(default = "default_dot")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadFileRequest {
    pub path: String,
    /// Lower than the configured cap only; larger values are clamped.
    #[serde(default, alias = "maxLines")]
    pub max_lines: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchFilesRequest {
    pub pattern: String,
    #[serde(default)]
    pub glob: Option<String>,
}

fn default_dot() -> String {
    ".".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Repo usage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageSource {
    Local,
    Github,
}

/// Which repository a tool touched, returned alongside its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoUsage {
    pub tool: String,
    pub source: UsageSource,
    pub path: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Limits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy)]
pub struct InspectLimits {
    pub read_file_max_lines: usize,
    pub search_max_matches: usize,
    pub search_text_max_chars: usize,
}

impl From<&ContextConfig> for InspectLimits {
    fn from(cfg: &ContextConfig) -> Self {
        Self {
            read_file_max_lines: cfg.read_file_max_lines,
            search_max_matches: cfg.search_max_matches,
            search_text_max_chars: cfg.search_text_max_chars,
        }
    }
}

impl InspectLimits {
    /// Lines `read_file` returns: the requested count, never above the
    /// configured cap and never below one.
    pub fn line_cap(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.read_file_max_lines)
            .min(self.read_file_max_lines)
            .max(1)
    }
}

impl Default for InspectLimits {
    fn default() -> Self {
        Self::from(&ContextConfig::default())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inspector trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A read-only view of a repository tree.
#[async_trait::async_trait]
pub trait RepoInspector: Send + Sync {
    fn source(&self) -> UsageSource;

    async fn list_directory(&self, req: ListDirectoryRequest) -> Result<Value, String>;

    async fn read_file(&self, req: ReadFileRequest) -> Result<Value, String>;

    async fn search_files(&self, req: SearchFilesRequest) -> Result<Value, String>;
}
