use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context pack and tool output caps
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "d_12000")]
    pub conversation_max_chars: usize,
    #[serde(default = "d_500")]
    pub read_file_max_lines: usize,
    #[serde(default = "d_100")]
    pub search_max_matches: usize,
    #[serde(default = "d_200")]
    pub search_text_max_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            conversation_max_chars: 12_000,
            read_file_max_lines: 500,
            search_max_matches: 100,
            search_text_max_chars: 200,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_12000() -> usize {
    12_000
}
fn d_500() -> usize {
    500
}
fn d_100() -> usize {
    100
}
fn d_200() -> usize {
    200
}
