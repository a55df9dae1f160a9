use serde::Serialize;

/// Structured trace events emitted across all pm crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ContextBuilt {
        total_chars: usize,
        conversation_chars: usize,
        conversation_truncated: bool,
        rules_included: usize,
        template_found: bool,
        checklist_found: bool,
        vcs_status_available: bool,
    },
    LlmRequest {
        provider: String,
        model: String,
        iteration: usize,
        duration_ms: u64,
        tool_calls: usize,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    ToolDispatched {
        tool_name: String,
        is_error: bool,
        duration_ms: u64,
    },
    TicketCreated {
        display_id: String,
        repo_full_name: Option<String>,
        ticket_number: i64,
        attempts: u32,
        ready: bool,
    },
    TicketMoved {
        display_id: String,
        from_column: Option<String>,
        to_column: String,
        to_repo: Option<String>,
        position: i64,
    },
    TicketIdConflict {
        candidate: i64,
        attempt: u32,
    },
    StoreCall {
        endpoint: String,
        status: u16,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "pm_event");
    }
}
