use serde::{Deserialize, Serialize};

use super::AuthConfig;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connected project (remote repository inspection)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// When true, `list_directory` / `read_file` / `search_files` go to
    /// the GitHub API instead of the local checkout.
    #[serde(default)]
    pub connected: bool,
    /// Falls back to `project.repo_full_name` when unset.
    #[serde(default)]
    pub repo_full_name: Option<String>,
    #[serde(default = "d_api_base")]
    pub api_base: String,
    #[serde(default = "d_github_auth")]
    pub auth: AuthConfig,
    #[serde(default = "d_15000u")]
    pub timeout_ms: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            connected: false,
            repo_full_name: None,
            api_base: d_api_base(),
            auth: d_github_auth(),
            timeout_ms: 15_000,
        }
    }
}

fn d_api_base() -> String {
    "https://api.github.com".into()
}
fn d_github_auth() -> AuthConfig {
    AuthConfig::from_env("GITHUB_TOKEN")
}
fn d_15000u() -> u64 {
    15_000
}
