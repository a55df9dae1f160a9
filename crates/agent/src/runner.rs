//! The per-turn tool loop.
//!
//! A turn builds the context pack, then alternates between the completion
//! endpoint and the tool registry until the model answers in text or the
//! round-trip cap is reached. Tool calls run one at a time, in the order
//! the model asked for them.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

use pm_contextpack::{ContextInput, ContextPackBuilder, ContextReport, ConversationTurn};
use pm_domain::redact::redact_value;
use pm_domain::tool::{ImageAttachment, Message, ToolCall, Usage};
use pm_domain::trace::TraceEvent;
use pm_providers::{ChatRequest, LlmProvider};
use pm_tools::RepoUsage;

use crate::fallback::{fallback_reply, ToolCallRecord};
use crate::prompt::system_prompt;
use crate::tools::ToolRegistry;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Errors and states
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where a failed turn stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TurnPhase {
    /// Nothing was sent to the model.
    ContextPack,
    /// The completion call itself failed.
    Openai,
    /// A tool crashed while running.
    Tool,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TurnPhase::ContextPack => "context-pack",
            TurnPhase::Openai => "openai",
            TurnPhase::Tool => "tool",
        })
    }
}

#[derive(Debug, Clone, thiserror::Error, Serialize)]
#[error("{phase}: {message}")]
pub struct TurnError {
    pub phase: TurnPhase,
    pub message: String,
}

impl TurnError {
    fn new(phase: TurnPhase, message: impl fmt::Display) -> Self {
        Self {
            phase,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    BuildingContext,
    AwaitingCompletion,
    ExecutingTool,
    Done,
    Failed,
}

fn transition(state: &mut TurnState, next: TurnState) {
    tracing::debug!(from = ?*state, to = ?next, "turn state");
    *state = next;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Input / output
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub message: String,
    pub images: Vec<ImageAttachment>,
    /// Used verbatim instead of `history` when present.
    pub conversation_summary: Option<String>,
    pub history: Vec<ConversationTurn>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResult {
    pub reply: String,
    /// True when the model produced no text and the reply was synthesized.
    pub used_fallback: bool,
    pub tool_calls: Vec<ToolCallRecord>,
    /// First request body of the turn, redacted.
    pub outbound_request: Option<Value>,
    /// Id of the last completion response, for diagnostics.
    pub response_id: Option<String>,
    pub repo_usage: Vec<RepoUsage>,
    pub usage: Usage,
    pub context_report: ContextReport,
    /// Tool round trips performed.
    pub iterations: usize,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Runner
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Runner {
    provider: Arc<dyn LlmProvider>,
    context: ContextPackBuilder,
    tools: Arc<ToolRegistry>,
    max_tool_iterations: usize,
    temperature: Option<f32>,
    extra_instructions: Option<String>,
}

impl Runner {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        context: ContextPackBuilder,
        tools: Arc<ToolRegistry>,
        max_tool_iterations: usize,
    ) -> Self {
        Self {
            provider,
            context,
            tools,
            max_tool_iterations,
            temperature: None,
            extra_instructions: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_extra_instructions(mut self, extra: Option<String>) -> Self {
        self.extra_instructions = extra;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one turn.
    pub async fn run(&self, input: TurnInput) -> Result<TurnResult, TurnError> {
        let span = tracing::info_span!(
            "turn",
            provider = %self.provider.provider_id(),
            model = %self.provider.default_model(),
            iterations = tracing::field::Empty,
        );
        let mut state = TurnState::BuildingContext;
        let result = self.run_inner(input, &mut state).instrument(span.clone()).await;
        match &result {
            Ok(r) => {
                span.record("iterations", r.iterations);
                transition(&mut state, TurnState::Done);
            }
            Err(e) => {
                tracing::warn!(phase = %e.phase, error = %e.message, "turn failed");
                transition(&mut state, TurnState::Failed);
            }
        }
        result
    }

    async fn run_inner(&self, input: TurnInput, state: &mut TurnState) -> Result<TurnResult, TurnError> {
        // ── Phase 1: context pack ────────────────────────────────────────
        let pack = self
            .context
            .build(&ContextInput {
                message: input.message.clone(),
                conversation_summary: input.conversation_summary.clone(),
                history: input.history.clone(),
            })
            .await
            .map_err(|e| TurnError::new(TurnPhase::ContextPack, e))?;

        let tool_defs = self.tools.definitions();
        let mut messages = vec![
            Message::system(system_prompt(
                self.tools.capabilities(),
                self.extra_instructions.as_deref(),
            )),
            Message::user_with_images(pack.text, &input.images),
        ];

        let mut records: Vec<ToolCallRecord> = Vec::new();
        let mut repo_usage: Vec<RepoUsage> = Vec::new();
        let mut usage = Usage::default();
        let mut outbound_request: Option<Value> = None;
        let mut response_id: Option<String> = None;
        let mut round_trips = 0usize;

        // ── Phase 2: tool loop ──────────────────────────────────────────
        let reply = loop {
            transition(state, TurnState::AwaitingCompletion);

            let req = ChatRequest {
                messages: messages.clone(),
                tools: tool_defs.clone(),
                temperature: self.temperature,
                ..ChatRequest::default()
            };
            if outbound_request.is_none() {
                outbound_request = Some(redact_value(&self.provider.request_body(&req)));
            }

            let llm_call_span = tracing::info_span!(
                "llm.call",
                "otel.kind" = "CLIENT",
                model = %self.provider.default_model(),
                input_tokens = tracing::field::Empty,
                output_tokens = tracing::field::Empty,
            );
            let started = Instant::now();
            let resp = self
                .provider
                .chat(&req)
                .instrument(llm_call_span.clone())
                .await
                .map_err(|e| TurnError::new(TurnPhase::Openai, e))?;

            if let Some(u) = &resp.usage {
                llm_call_span.record("input_tokens", u.prompt_tokens);
                llm_call_span.record("output_tokens", u.completion_tokens);
                usage.add(u);
            }
            TraceEvent::LlmRequest {
                provider: self.provider.provider_id().to_string(),
                model: resp.model.clone(),
                iteration: round_trips,
                duration_ms: started.elapsed().as_millis() as u64,
                tool_calls: resp.tool_calls.len(),
                prompt_tokens: resp.usage.map(|u| u.prompt_tokens),
                completion_tokens: resp.usage.map(|u| u.completion_tokens),
            }
            .emit();

            if resp.response_id.is_some() {
                response_id = resp.response_id.clone();
            }

            if resp.tool_calls.is_empty() {
                break resp.content;
            }
            if round_trips >= self.max_tool_iterations {
                tracing::warn!(
                    max = self.max_tool_iterations,
                    "tool round-trip cap reached; ending turn"
                );
                break resp.content;
            }

            // ── Tool dispatch ────────────────────────────────────────────
            transition(state, TurnState::ExecutingTool);
            messages.push(Message::assistant_tool_calls(&resp.content, &resp.tool_calls));
            for tc in &resp.tool_calls {
                let outcome = self.execute_tool(tc).await?;
                let content = serde_json::to_string(&outcome.output)
                    .unwrap_or_else(|e| format!("{{\"success\":false,\"error\":\"{e}\"}}"));
                messages.push(Message::tool_result(&tc.call_id, content, outcome.is_error));
                if let Some(u) = outcome.repo_usage {
                    repo_usage.push(u);
                }
                records.push(ToolCallRecord {
                    name: tc.tool_name.clone(),
                    input: tc.arguments.clone(),
                    output: outcome.output,
                });
            }
            round_trips += 1;
        };

        let reply = reply.trim().to_string();
        let used_fallback = reply.is_empty();
        let reply = if used_fallback {
            tracing::debug!(tool_calls = records.len(), "model returned no text; using fallback reply");
            fallback_reply(&records)
        } else {
            reply
        };

        Ok(TurnResult {
            reply,
            used_fallback,
            tool_calls: records,
            outbound_request,
            response_id,
            repo_usage,
            usage,
            context_report: pack.report,
            iterations: round_trips,
        })
    }

    /// Run one tool call on its own task so a panic surfaces as a
    /// tool-phase error instead of tearing down the turn.
    async fn execute_tool(&self, tc: &ToolCall) -> Result<crate::tools::ToolOutcome, TurnError> {
        let tool_span = tracing::info_span!("tool.call", tool_name = %tc.tool_name);
        let registry = self.tools.clone();
        let name = tc.tool_name.clone();
        let args = tc.arguments.clone();
        let started = Instant::now();

        let outcome = tokio::spawn(
            async move { registry.dispatch(&name, &args).await }.instrument(tool_span),
        )
        .await
        .map_err(|e| TurnError::new(TurnPhase::Tool, format!("{}: {e}", tc.tool_name)))?;

        TraceEvent::ToolDispatched {
            tool_name: tc.tool_name.clone(),
            is_error: outcome.is_error,
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();
        Ok(outcome)
    }
}
