use serde::{Deserialize, Serialize};

/// Machine-readable summary of a context pack build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextReport {
    /// File names of the rule documents included, in order.
    pub rules: Vec<String>,
    pub template_found: bool,
    pub checklist_found: bool,
    pub conversation_chars: usize,
    /// True when older turns were dropped from the window.
    pub conversation_truncated: bool,
    /// True when a pre-built summary was used verbatim.
    pub conversation_summarized: bool,
    pub vcs_status_available: bool,
    pub total_chars: usize,
}
