//! OpenAI-compatible adapter.
//!
//! Works with OpenAI and any endpoint that follows the chat completions
//! contract (Azure-style gateways, Ollama, vLLM, LM Studio, ...).

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};
use pm_domain::config::LlmConfig;
use pm_domain::error::{Error, Result};
use pm_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition, Usage};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    auth_header: String,
    auth_prefix: String,
    default_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create the provider from `[llm]`, resolving the API key.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;
        let mut provider = Self::new(&cfg.base_url, api_key, &cfg.model, cfg.timeout_ms)?;
        if let Some(header) = &cfg.auth.header {
            provider.auth_header = header.clone();
        }
        if let Some(prefix) = &cfg.auth.prefix {
            provider.auth_prefix = prefix.clone();
        }
        Ok(provider)
    }

    pub fn new(base_url: &str, api_key: String, model: &str, timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: "openai_compat".into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            auth_header: "Authorization".into(),
            auth_prefix: "Bearer ".into(),
            default_model: model.to_string(),
            client,
        })
    }

    // ── HTTP ─────────────────────────────────────────────────────────

    fn post_json(&self, url: &str) -> reqwest::RequestBuilder {
        let header_value = format!("{}{}", self.auth_prefix, self.api_key);
        self.client
            .post(url)
            .header(&self.auth_header, &header_value)
            .header("Content-Type", "application/json")
    }

    /// Request model override, else the configured model.
    fn effective_model(&self, req: &ChatRequest) -> String {
        req.model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    fn build_chat_body(&self, req: &ChatRequest) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(wire_message).collect();

        let mut body = serde_json::json!({
            "model": self.effective_model(req),
            "messages": messages,
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(wire_tool).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire format (requests)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn wire_message(msg: &Message) -> Value {
    match msg.role {
        Role::Tool => wire_tool_result(msg),
        Role::Assistant => wire_assistant(msg),
        Role::User if msg.content.has_images() => wire_user_parts(msg),
        _ => serde_json::json!({
            "role": wire_role(msg.role),
            "content": msg.content.extract_all_text(),
        }),
    }
}

/// Mixed text/image user content as an array of content parts.
fn wire_user_parts(msg: &Message) -> Value {
    let parts: Vec<Value> = match &msg.content {
        MessageContent::Text(t) => vec![serde_json::json!({"type": "text", "text": t})],
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => {
                    Some(serde_json::json!({"type": "text", "text": text}))
                }
                ContentPart::Image { url, .. } => Some(serde_json::json!({
                    "type": "image_url",
                    "image_url": { "url": url },
                })),
                _ => None,
            })
            .collect(),
    };
    serde_json::json!({ "role": "user", "content": parts })
}

fn wire_assistant(msg: &Message) -> Value {
    let mut obj = serde_json::json!({"role": "assistant"});
    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<Value> = Vec::new();

    match &msg.content {
        MessageContent::Text(t) => text_parts.push(t.clone()),
        MessageContent::Parts(parts) => {
            for part in parts {
                match part {
                    ContentPart::Text { text } => text_parts.push(text.clone()),
                    ContentPart::ToolUse { id, name, input } => {
                        tool_calls.push(serde_json::json!({
                            "id": id,
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": input.to_string(),
                            }
                        }));
                    }
                    _ => {}
                }
            }
        }
    }

    obj["content"] = if text_parts.is_empty() {
        Value::Null
    } else {
        Value::String(text_parts.join("\n"))
    };
    if !tool_calls.is_empty() {
        obj["tool_calls"] = Value::Array(tool_calls);
    }
    obj
}

fn wire_tool_result(msg: &Message) -> Value {
    let found = match &msg.content {
        MessageContent::Parts(parts) => parts.iter().find_map(|part| match part {
            ContentPart::ToolResult {
                tool_use_id,
                content,
                ..
            } => Some((tool_use_id.as_str(), content.as_str())),
            _ => None,
        }),
        MessageContent::Text(t) => Some(("", t.as_str())),
    };
    let (id, content) = found.unwrap_or(("", ""));
    serde_json::json!({
        "role": "tool",
        "tool_call_id": id,
        "content": content,
    })
}

fn wire_tool(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire format (responses)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    /// JSON-encoded; some servers send an empty string for no arguments.
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(u: WireUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

impl From<WireToolCall> for ToolCall {
    fn from(tc: WireToolCall) -> Self {
        let arguments = match tc.function.arguments.trim() {
            "" => Value::Object(Default::default()),
            raw => serde_json::from_str(raw).unwrap_or_else(|e| {
                tracing::warn!(
                    call_id = %tc.id,
                    tool = %tc.function.name,
                    error = %e,
                    "tool call arguments are not valid JSON; using an empty object"
                );
                Value::Object(Default::default())
            }),
        };
        ToolCall {
            call_id: tc.id,
            tool_name: tc.function.name,
            arguments,
        }
    }
}

fn parse_chat_response(provider: &str, raw: &str) -> Result<ChatResponse> {
    let wire: WireResponse = serde_json::from_str(raw)?;
    let provider_err = |message: &str| Error::Provider {
        provider: provider.into(),
        message: message.into(),
    };

    let choice = wire
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| provider_err("response has no choices"))?;
    let message = choice
        .message
        .ok_or_else(|| provider_err("first choice has no message"))?;

    Ok(ChatResponse {
        content: message.content.unwrap_or_default(),
        tool_calls: message.tool_calls.into_iter().map(ToolCall::from).collect(),
        usage: wire.usage.map(Usage::from),
        model: wire.model.unwrap_or_else(|| "unknown".into()),
        finish_reason: choice.finish_reason,
        response_id: wire.id,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_body(req);

        tracing::debug!(url = %url, messages = req.messages.len(), "chat completion request");

        let resp = self
            .post_json(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let text = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("{status}: {}", text.trim()),
            });
        }
        parse_chat_response(&self.id, &text)
    }

    fn request_body(&self, req: &ChatRequest) -> Value {
        self.build_chat_body(req)
    }

    fn provider_id(&self) -> &str {
        &self.id
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use pm_domain::tool::ImageAttachment;
    use serde_json::json;

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::new("https://api.example.com/v1/", "sk-test".into(), "gpt-4o", 1_000)
            .unwrap()
    }

    #[test]
    fn body_carries_model_and_tools() {
        let req = ChatRequest {
            messages: vec![Message::system("sys"), Message::user("hi")],
            tools: vec![ToolDefinition {
                name: "read_file".into(),
                description: "Read a file".into(),
                parameters: json!({"type": "object"}),
            }],
            ..ChatRequest::default()
        };
        let body = provider().request_body(&req);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][1], json!({"role": "user", "content": "hi"}));
        assert_eq!(body["tools"][0]["function"]["name"], "read_file");
        assert!(body.get("temperature").is_none());
        // Responses-API continuation is not a chat-completions argument.
        assert!(body.get("previous_response_id").is_none());
    }

    #[test]
    fn images_become_content_parts() {
        let img = ImageAttachment {
            url: "https://example.com/a.png".into(),
            media_type: None,
        };
        let body = provider().request_body(&ChatRequest {
            messages: vec![Message::user_with_images("what is this", &[img])],
            ..ChatRequest::default()
        });
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0], json!({"type": "text", "text": "what is this"}));
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "https://example.com/a.png");
    }

    #[test]
    fn tool_round_trip_messages_serialize() {
        let call = ToolCall {
            call_id: "call_1".into(),
            tool_name: "list_directory".into(),
            arguments: json!({"path": "."}),
        };
        let body = provider().request_body(&ChatRequest {
            messages: vec![
                Message::assistant_tool_calls("", &[call]),
                Message::tool_result("call_1", "[\"src\"]", false),
            ],
            ..ChatRequest::default()
        });
        let assistant = &body["messages"][0];
        assert!(assistant["content"].is_null());
        assert_eq!(assistant["tool_calls"][0]["function"]["arguments"], "{\"path\":\".\"}");
        assert_eq!(body["messages"][1]["tool_call_id"], "call_1");
    }

    #[test]
    fn parses_tool_calls_usage_and_id() {
        let resp = json!({
            "id": "chatcmpl-42",
            "model": "gpt-4o-2024",
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "read_file", "arguments": "{\"path\":\"a.md\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });
        let parsed = parse_chat_response("openai_compat", &resp.to_string()).unwrap();
        assert_eq!(parsed.content, "");
        assert_eq!(parsed.response_id.as_deref(), Some("chatcmpl-42"));
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].arguments["path"], "a.md");
        assert_eq!(parsed.usage.map(|u| u.total_tokens), Some(15));
    }

    #[test]
    fn malformed_or_empty_arguments_become_empty_object() {
        let resp = json!({
            "choices": [{
                "message": {
                    "tool_calls": [
                        {"id": "a", "function": {"name": "x", "arguments": "not json"}},
                        {"id": "b", "function": {"name": "y", "arguments": ""}}
                    ]
                }
            }]
        });
        let parsed = parse_chat_response("openai_compat", &resp.to_string()).unwrap();
        assert_eq!(parsed.tool_calls[0].arguments, json!({}));
        assert_eq!(parsed.tool_calls[1].arguments, json!({}));
        assert_eq!(parsed.model, "unknown");
    }

    #[test]
    fn missing_choices_is_provider_error() {
        let err = parse_chat_response("openai_compat", r#"{"id": "x"}"#).unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }
}
