use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Project (repository under management)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Root of the local checkout; every file tool is sandboxed to it.
    #[serde(default = "d_root")]
    pub root: PathBuf,
    /// `owner/name` of the repository. Scopes ticket numbering.
    #[serde(default)]
    pub repo_full_name: Option<String>,
    /// Directory of rule documents (`*.md`, `*.mdc`), relative to `root`.
    #[serde(default = "d_rules_dir")]
    pub rules_dir: PathBuf,
    #[serde(default = "d_ticket_template")]
    pub ticket_template: PathBuf,
    #[serde(default = "d_ready_checklist")]
    pub ready_checklist: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: d_root(),
            repo_full_name: None,
            rules_dir: d_rules_dir(),
            ticket_template: d_ticket_template(),
            ready_checklist: d_ready_checklist(),
        }
    }
}

impl ProjectConfig {
    pub fn rules_path(&self) -> PathBuf {
        self.root.join(&self.rules_dir)
    }
    pub fn template_path(&self) -> PathBuf {
        self.root.join(&self.ticket_template)
    }
    pub fn checklist_path(&self) -> PathBuf {
        self.root.join(&self.ready_checklist)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_root() -> PathBuf {
    PathBuf::from(".")
}
fn d_rules_dir() -> PathBuf {
    PathBuf::from(".cursor/rules")
}
fn d_ticket_template() -> PathBuf {
    PathBuf::from("docs/templates/ticket.template.md")
}
fn d_ready_checklist() -> PathBuf {
    PathBuf::from("docs/process/ready-to-start-checklist.md")
}
