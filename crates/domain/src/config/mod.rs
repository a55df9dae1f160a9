mod agent;
mod context;
mod github;
mod llm;
mod observability;
mod project;
mod store;

pub use agent::*;
pub use context::*;
pub use github::*;
pub use llm::*;
pub use observability::*;
pub use project::*;
pub use store::*;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ticket::is_valid_repo_full_name;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Repository used for the connected-project tools.
    pub fn github_repo(&self) -> Option<&str> {
        self.github
            .repo_full_name
            .as_deref()
            .or(self.project.repo_full_name.as_deref())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.llm.base_url.trim().is_empty() {
            errors.push(ConfigError::error("llm.base_url", "base_url must not be empty"));
        }
        if self.llm.model.trim().is_empty() {
            errors.push(ConfigError::error("llm.model", "model must not be empty"));
        }

        if self.agent.max_tool_iterations == 0 {
            errors.push(ConfigError::error(
                "agent.max_tool_iterations",
                "must be greater than 0",
            ));
        }

        for (field, value) in [
            ("context.conversation_max_chars", self.context.conversation_max_chars),
            ("context.read_file_max_lines", self.context.read_file_max_lines),
            ("context.search_max_matches", self.context.search_max_matches),
            ("context.search_text_max_chars", self.context.search_text_max_chars),
        ] {
            if value == 0 {
                errors.push(ConfigError::error(field, "must be greater than 0"));
            }
        }

        if let Some(repo) = &self.project.repo_full_name {
            if !is_valid_repo_full_name(repo) {
                errors.push(ConfigError::error(
                    "project.repo_full_name",
                    format!("\"{repo}\" is not of the form owner/name"),
                ));
            }
        }

        match &self.store.base_url {
            None => errors.push(ConfigError::warning(
                "store.base_url",
                "no ticket store configured; ticket tools are disabled",
            )),
            Some(url) if url.trim().is_empty() => {
                errors.push(ConfigError::error("store.base_url", "base_url must not be empty"));
            }
            Some(_) => {}
        }
        if self.store.table.trim().is_empty() {
            errors.push(ConfigError::error("store.table", "table must not be empty"));
        }

        if let Some(repo) = &self.github.repo_full_name {
            if !is_valid_repo_full_name(repo) {
                errors.push(ConfigError::error(
                    "github.repo_full_name",
                    format!("\"{repo}\" is not of the form owner/name"),
                ));
            }
        }
        if self.github.connected && self.github_repo().is_none() {
            errors.push(ConfigError::warning(
                "github.repo_full_name",
                "connected mode is on but no repository is set; local tools will be used",
            ));
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError::error(
                "observability.sample_rate",
                "sample_rate must be between 0.0 and 1.0",
            ));
        }

        errors
    }
}
