use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard cap on tool round trips per turn.
    #[serde(default = "d_10")]
    pub max_tool_iterations: usize,
    /// Extra instructions appended to the built-in system prompt.
    #[serde(default)]
    pub extra_instructions: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: 10,
            extra_instructions: None,
        }
    }
}

fn d_10() -> usize {
    10
}
