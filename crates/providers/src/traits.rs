use pm_domain::error::Result;
use pm_domain::tool::{Message, ToolCall, ToolDefinition, Usage};
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Completion request / response
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One call to the completion endpoint.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// System instructions, the context pack and any tool exchanges so far.
    pub messages: Vec<Message>,
    /// Tools offered for this call; empty disables tool calling.
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Overrides the configured model for this call only.
    pub model: Option<String>,
}

/// What came back from one completion call.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Assistant text; empty when the model only asked for tools.
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
    /// Model name reported by the endpoint.
    pub model: String,
    pub finish_reason: Option<String>,
    /// Provider response id. Reported for diagnostics only; the
    /// chat-completions wire has no way to resume from it.
    pub response_id: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A completion endpoint the runner can drive.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send `req` and wait for the complete (non-streamed) response.
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse>;

    /// The exact JSON body `chat` would send for `req`.
    fn request_body(&self, req: &ChatRequest) -> Value;

    /// Short name used in logs and trace events.
    fn provider_id(&self) -> &str;

    /// The model used when a request does not override it.
    fn default_model(&self) -> &str;
}
