//! Runner construction shared by the `run`, `chat` and `context` commands.

use std::sync::Arc;

use anyhow::Context;

use pm_contextpack::ContextPackBuilder;
use pm_domain::config::{Config, ConfigSeverity};
use pm_providers::{resolve_api_key, LlmProvider, OpenAiCompatProvider};
use pm_tickets::{RestTicketStore, TicketManager};
use pm_tools::{GithubRepo, InspectLimits, LocalRepo, RepoInspector};

use crate::runner::Runner;
use crate::tools::ToolRegistry;

/// Validate config and wire a [`Runner`] from it.
pub fn build_runner(config: &Config) -> anyhow::Result<Runner> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Completion endpoint ──────────────────────────────────────────
    let provider: Arc<dyn LlmProvider> = Arc::new(
        OpenAiCompatProvider::from_config(&config.llm).context("initializing LLM provider")?,
    );
    tracing::info!(base_url = %config.llm.base_url, model = %config.llm.model, "LLM provider ready");

    let tools = Arc::new(build_tool_registry(config)?);

    Ok(Runner::new(
        provider,
        context_builder(config),
        tools,
        config.agent.max_tool_iterations,
    )
    .with_temperature(config.llm.temperature)
    .with_extra_instructions(config.agent.extra_instructions.clone()))
}

pub fn context_builder(config: &Config) -> ContextPackBuilder {
    ContextPackBuilder::new(config.project.clone(), &config.context)
}

/// Repository inspector plus, when the store is reachable, ticket tools.
pub fn build_tool_registry(config: &Config) -> anyhow::Result<ToolRegistry> {
    Ok(ToolRegistry::new(repo_inspector(config)?, ticket_manager(config)))
}

fn repo_inspector(config: &Config) -> anyhow::Result<Arc<dyn RepoInspector>> {
    let limits = InspectLimits::from(&config.context);

    if config.github.connected {
        if let Some(repo) = config.github_repo() {
            let token = match resolve_api_key(&config.github.auth) {
                Ok(t) => Some(t),
                Err(e) => {
                    tracing::warn!(error = %e, "no GitHub token; using unauthenticated requests");
                    None
                }
            };
            let inspector = GithubRepo::new(
                &config.github.api_base,
                repo,
                token,
                config.github.timeout_ms,
                limits,
            )
            .map_err(anyhow::Error::msg)?;
            tracing::info!(repo, "repository tools use the GitHub API");
            return Ok(Arc::new(inspector));
        }
        tracing::warn!("github.connected is set without a repository; using the local checkout");
    }

    tracing::info!(root = %config.project.root.display(), "repository tools use the local checkout");
    Ok(Arc::new(LocalRepo::new(config.project.root.clone(), limits)))
}

fn ticket_manager(config: &Config) -> Option<TicketManager> {
    config.store.base_url.as_ref()?;

    let key = match resolve_api_key(&config.store.auth) {
        Ok(k) => k,
        Err(e) => {
            tracing::warn!(error = %e, "ticket store key unavailable; ticket tools disabled");
            return None;
        }
    };
    let store = match RestTicketStore::new(&config.store, key) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "ticket store unavailable; ticket tools disabled");
            return None;
        }
    };

    let repo = config
        .project
        .repo_full_name
        .clone()
        .or_else(|| config.github.repo_full_name.clone());
    let manager = TicketManager::new(Arc::new(store), repo);
    tracing::info!(repo = ?manager.repo(), table = %config.store.table, "ticket store ready");
    Some(manager)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_store_means_no_ticket_tools() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.project.root = dir.path().to_path_buf();

        let registry = build_tool_registry(&config).unwrap();
        assert!(!registry.capabilities().ticket_store);
    }

    #[test]
    fn store_without_key_disables_ticket_tools() {
        let mut config = Config::default();
        config.store.base_url = Some("https://example.invalid".into());
        config.store.auth = pm_domain::config::AuthConfig::from_env("PM_TEST_UNSET_STORE_KEY_71");
        assert!(ticket_manager(&config).is_none());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = Config::default();
        config.agent.max_tool_iterations = 0;
        assert!(build_runner(&config).is_err());
    }
}
