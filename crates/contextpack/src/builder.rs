use pm_domain::config::{ContextConfig, ProjectConfig};
use pm_domain::error::{Error, Result};
use pm_domain::trace::TraceEvent;

use crate::conversation::{render_conversation, ConversationTurn};
use crate::injection;
use crate::report::ContextReport;
use crate::sources;

/// Per-turn inputs supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct ContextInput {
    pub message: String,
    /// Pre-built summary; used verbatim instead of `history` when present.
    pub conversation_summary: Option<String>,
    /// Prior turns, oldest first.
    pub history: Vec<ConversationTurn>,
}

/// The assembled pack plus its report.
#[derive(Debug, Clone)]
pub struct ContextPack {
    pub text: String,
    pub report: ContextReport,
}

/// Context pack builder.
///
/// Reads the project's rules, template and checklist from disk on each
/// call and captures `git status`. Missing documents become explicit
/// placeholders.
pub struct ContextPackBuilder {
    project: ProjectConfig,
    conversation_max_chars: usize,
}

impl ContextPackBuilder {
    pub fn new(project: ProjectConfig, context: &ContextConfig) -> Self {
        Self {
            project,
            conversation_max_chars: context.conversation_max_chars,
        }
    }

    /// Build the context pack.
    ///
    /// Only conversation assembly can fail. A missing project root reads
    /// like any other missing document and degrades to placeholders.
    pub async fn build(&self, input: &ContextInput) -> Result<ContextPack> {
        let root = &self.project.root;
        if !root.is_dir() {
            tracing::warn!(root = %root.display(), "project root is not a directory");
        }

        let mut report = ContextReport::default();
        let mut assembled = String::new();

        assembled.push_str(&injection::format_inbound_message(input.message.trim()));
        assembled.push('\n');

        // Conversation
        match input.conversation_summary.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(summary) => {
                report.conversation_summarized = true;
                report.conversation_chars = summary.chars().count();
                assembled.push_str(&injection::format_conversation(summary, "summary"));
                assembled.push('\n');
            }
            None if !input.history.is_empty() => {
                let (window, truncated) =
                    render_conversation(&input.history, self.conversation_max_chars)
                        .map_err(|e| Error::Other(format!("assembling conversation: {e}")))?;
                report.conversation_chars = window.chars().count();
                report.conversation_truncated = truncated;
                assembled.push_str(&injection::format_conversation(window.trim_end(), "window"));
                assembled.push('\n');
            }
            None => {}
        }

        // Rules
        let rules_dir = self.project.rules_path();
        let rules = sources::read_rules(&rules_dir).await;
        if rules.is_empty() {
            assembled.push_str(&injection::format_rules_missing(
                &self.project.rules_dir.display().to_string(),
            ));
            assembled.push('\n');
        }
        for (name, content) in &rules {
            assembled.push_str(&injection::format_rule(name, content.trim_end()));
            assembled.push('\n');
            report.rules.push(name.clone());
        }

        // Template and checklist
        let template = sources::read_optional(&self.project.template_path()).await;
        report.template_found = template.is_some();
        assembled.push_str(&injection::format_document(
            "TICKET_TEMPLATE",
            &self.project.ticket_template.display().to_string(),
            template.as_deref().map(str::trim_end),
        ));
        assembled.push('\n');

        let checklist = sources::read_optional(&self.project.checklist_path()).await;
        report.checklist_found = checklist.is_some();
        assembled.push_str(&injection::format_document(
            "READY_CHECKLIST",
            &self.project.ready_checklist.display().to_string(),
            checklist.as_deref().map(str::trim_end),
        ));
        assembled.push('\n');

        // VCS status
        let status = sources::git_status(root).await;
        report.vcs_status_available = status.is_some();
        assembled.push_str(&injection::format_vcs_status(status.as_deref()));

        report.total_chars = assembled.chars().count();

        TraceEvent::ContextBuilt {
            total_chars: report.total_chars,
            conversation_chars: report.conversation_chars,
            conversation_truncated: report.conversation_truncated,
            rules_included: report.rules.len(),
            template_found: report.template_found,
            checklist_found: report.checklist_found,
            vcs_status_available: report.vcs_status_available,
        }
        .emit();

        Ok(ContextPack {
            text: assembled,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn builder_for(root: &std::path::Path, max_chars: usize) -> ContextPackBuilder {
        let project = ProjectConfig {
            root: root.to_path_buf(),
            ..ProjectConfig::default()
        };
        let context = ContextConfig {
            conversation_max_chars: max_chars,
            ..ContextConfig::default()
        };
        ContextPackBuilder::new(project, &context)
    }

    #[tokio::test]
    async fn missing_documents_degrade_to_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let pack = builder_for(dir.path(), 12_000)
            .build(&ContextInput {
                message: "what is left?".into(),
                ..ContextInput::default()
            })
            .await
            .unwrap();

        assert!(pack.text.contains("=== INBOUND_MESSAGE ===\nwhat is left?"));
        assert!(pack.text.contains("(no rules found in .cursor/rules)"));
        assert!(pack
            .text
            .contains("(not found: docs/templates/ticket.template.md)"));
        assert_eq!(
            pack.report.vcs_status_available,
            !pack.text.contains(injection::STATUS_UNAVAILABLE)
        );
        assert!(!pack.report.template_found);
        assert!(!pack.report.checklist_found);
        assert!(!pack.text.contains("=== CONVERSATION ==="));
    }

    #[tokio::test]
    async fn documents_and_rules_are_included() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".cursor/rules")).unwrap();
        fs::write(dir.path().join(".cursor/rules/style.mdc"), "Use tabs.").unwrap();
        fs::create_dir_all(dir.path().join("docs/templates")).unwrap();
        fs::write(
            dir.path().join("docs/templates/ticket.template.md"),
            "## Goal\n<goal>\r\n",
        )
        .unwrap();

        let pack = builder_for(dir.path(), 12_000)
            .build(&ContextInput {
                message: "hi".into(),
                ..ContextInput::default()
            })
            .await
            .unwrap();

        assert_eq!(pack.report.rules, vec!["style.mdc".to_string()]);
        assert!(pack.text.contains("=== RULE: style.mdc ==="));
        assert!(pack.text.contains("Use tabs."));
        assert!(pack.report.template_found);
        assert!(pack.text.contains("## Goal\n<goal>"));
        assert_eq!(pack.report.total_chars, pack.text.chars().count());
    }

    #[tokio::test]
    async fn summary_is_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let pack = builder_for(dir.path(), 12_000)
            .build(&ContextInput {
                message: "next".into(),
                conversation_summary: Some("User wants tickets for auth.".into()),
                history: vec![ConversationTurn::user("ignored history")],
            })
            .await
            .unwrap();

        assert!(pack.report.conversation_summarized);
        assert!(pack.text.contains("SOURCE: summary"));
        assert!(pack.text.contains("User wants tickets for auth."));
        assert!(!pack.text.contains("ignored history"));
    }

    #[tokio::test]
    async fn long_history_is_windowed() {
        let dir = tempfile::tempdir().unwrap();
        let history: Vec<ConversationTurn> = (0..50)
            .map(|i| ConversationTurn::user(format!("turn {i:02} {}", "y".repeat(100))))
            .collect();
        let pack = builder_for(dir.path(), 1_000)
            .build(&ContextInput {
                message: "next".into(),
                conversation_summary: None,
                history,
            })
            .await
            .unwrap();

        assert!(pack.report.conversation_truncated);
        assert!(pack.text.contains("(older messages omitted)"));
        assert!(pack.text.contains("turn 49"));
        assert!(!pack.text.contains("turn 00"));
    }

    #[tokio::test]
    async fn missing_root_degrades_to_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let pack = builder_for(&dir.path().join("gone"), 12_000)
            .build(&ContextInput {
                message: "anything new?".into(),
                ..ContextInput::default()
            })
            .await
            .unwrap();

        assert!(pack.text.contains("=== INBOUND_MESSAGE ===\nanything new?"));
        assert!(pack.text.contains("(no rules found in .cursor/rules)"));
        assert!(pack.text.contains(injection::STATUS_UNAVAILABLE));
        assert!(!pack.report.vcs_status_available);
        assert!(!pack.report.template_found);
    }

    #[tokio::test]
    async fn conversation_chars_are_counted_in_characters() {
        let dir = tempfile::tempdir().unwrap();
        let pack = builder_for(dir.path(), 12_000)
            .build(&ContextInput {
                message: "next".into(),
                conversation_summary: Some("résumé ✓".into()),
                history: vec![],
            })
            .await
            .unwrap();
        assert_eq!(pack.report.conversation_chars, 8);
    }
}
