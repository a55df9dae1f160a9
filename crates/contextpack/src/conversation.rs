use std::collections::TryReserveError;

use serde::{Deserialize, Serialize};

/// Marker emitted when older turns were dropped to fit the budget.
pub const OMITTED_MARKER: &str = "(older messages omitted)";

/// One prior exchange line kept by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: content.into() }
    }

    fn render(&self) -> String {
        format!("**{}**: {}\n\n", self.role, self.content.trim())
    }
}

/// Render the most recent turns whose combined length in characters stays
/// under `max_chars`, oldest first. Returns the text and whether anything
/// was dropped.
///
/// Turns are selected newest-first; the first turn that does not fit stops
/// the scan so the window is always a contiguous suffix of the history.
/// Allocation failure for the window is the only error.
pub fn render_conversation(
    turns: &[ConversationTurn],
    max_chars: usize,
) -> Result<(String, bool), TryReserveError> {
    let mut kept: Vec<String> = Vec::new();
    let mut used = 0usize;
    let mut bytes = 0usize;

    for turn in turns.iter().rev() {
        let rendered = turn.render();
        let chars = rendered.chars().count();
        if used + chars >= max_chars {
            break;
        }
        used += chars;
        bytes += rendered.len();
        kept.push(rendered);
    }

    let truncated = kept.len() < turns.len();
    let mut out = String::new();
    out.try_reserve(bytes + OMITTED_MARKER.len() + 2)?;
    if truncated {
        out.push_str(OMITTED_MARKER);
        out.push_str("\n\n");
    }
    for rendered in kept.iter().rev() {
        out.push_str(rendered);
    }
    Ok((out, truncated))
}
