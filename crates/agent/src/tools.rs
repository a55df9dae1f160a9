//! Tool registry for the runner: builds the tool definitions offered to
//! the model and dispatches tool calls to the repository inspector and the
//! ticket manager.
//!
//! The tool set is assembled per turn from one declarative table, each
//! entry gated by the capability it needs. Failures never escape as
//! errors; they come back as `{"success": false, "error": ...}` so the
//! model can explain them.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use pm_domain::ticket::Ticket;
use pm_domain::tool::ToolDefinition;
use pm_tickets::{TicketError, TicketManager};
use pm_tools::{
    ListDirectoryRequest, ReadFileRequest, RepoInspector, RepoUsage, SearchFilesRequest,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Capabilities
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Read-only repository inspection (local or connected).
    Repo,
    /// Pure markdown checks that need no backing store.
    Readiness,
    /// Anything that reads or writes the ticket store.
    TicketStore,
}

/// Feature flags for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub repo: bool,
    pub readiness: bool,
    pub ticket_store: bool,
}

impl Capabilities {
    pub fn allows(&self, cap: Capability) -> bool {
        match cap {
            Capability::Repo => self.repo,
            Capability::Readiness => self.readiness,
            Capability::TicketStore => self.ticket_store,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool table
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const LIST_DIRECTORY: &str = "list_directory";
pub const READ_FILE: &str = "read_file";
pub const SEARCH_FILES: &str = "search_files";
pub const CREATE_TICKET: &str = "create_ticket";
pub const FETCH_TICKET_CONTENT: &str = "fetch_ticket_content";
pub const EVALUATE_TICKET_READY: &str = "evaluate_ticket_ready";
pub const UPDATE_TICKET_BODY: &str = "update_ticket_body";
pub const MOVE_TICKET_TO_TODO: &str = "kanban_move_ticket_to_todo";
pub const MOVE_TICKET_TO_OTHER_REPO_TODO: &str = "kanban_move_ticket_to_other_repo_todo";
pub const LIST_TICKETS_BY_COLUMN: &str = "list_tickets_by_column";
pub const LIST_AVAILABLE_REPOS: &str = "list_available_repos";

struct ToolSpec {
    name: &'static str,
    description: &'static str,
    capability: Capability,
    parameters: fn() -> Value,
}

const TOOL_SPECS: &[ToolSpec] = &[
    ToolSpec {
        name: LIST_DIRECTORY,
        description: "List the immediate children of a directory in the project repository.",
        capability: Capability::Repo,
        parameters: || {
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Directory relative to the repository root" }
                },
                "required": ["path"]
            })
        },
    },
    ToolSpec {
        name: READ_FILE,
        description: "Read a text file from the project repository (at most 500 lines).",
        capability: Capability::Repo,
        parameters: || {
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File path relative to the repository root" },
                    "maxLines": { "type": "integer", "description": "Optional lower line limit" }
                },
                "required": ["path"]
            })
        },
    },
    ToolSpec {
        name: SEARCH_FILES,
        description: "Search repository files with a regular expression. Returns up to 100 {path, line, text} matches.",
        capability: Capability::Repo,
        parameters: || {
            json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string", "description": "Regular expression" },
                    "glob": { "type": "string", "description": "File filter, e.g. **/*.md" }
                },
                "required": ["pattern"]
            })
        },
    },
    ToolSpec {
        name: CREATE_TICKET,
        description: "Create a ticket in Unassigned. A ready ticket is moved to To-do automatically.",
        capability: Capability::TicketStore,
        parameters: || {
            json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string", "description": "Short ticket title" },
                    "body_md": { "type": "string", "description": "Full markdown body following the ticket template" }
                },
                "required": ["title", "body_md"]
            })
        },
    },
    ToolSpec {
        name: FETCH_TICKET_CONTENT,
        description: "Fetch a ticket's title, body and board position.",
        capability: Capability::TicketStore,
        parameters: ticket_id_schema,
    },
    ToolSpec {
        name: EVALUATE_TICKET_READY,
        description: "Check a ticket body against the Definition of Ready.",
        capability: Capability::Readiness,
        parameters: || {
            json!({
                "type": "object",
                "properties": {
                    "body_md": { "type": "string", "description": "Markdown body to evaluate" }
                },
                "required": ["body_md"]
            })
        },
    },
    ToolSpec {
        name: UPDATE_TICKET_BODY,
        description: "Replace a ticket's markdown body and report its readiness.",
        capability: Capability::TicketStore,
        parameters: || {
            json!({
                "type": "object",
                "properties": {
                    "ticket_id": { "type": "string", "description": "Display id (HAL-0012), number, or UUID" },
                    "body_md": { "type": "string", "description": "New markdown body" }
                },
                "required": ["ticket_id", "body_md"]
            })
        },
    },
    ToolSpec {
        name: MOVE_TICKET_TO_TODO,
        description: "Move a ready ticket from Unassigned to the end of To-do.",
        capability: Capability::TicketStore,
        parameters: ticket_id_schema,
    },
    ToolSpec {
        name: MOVE_TICKET_TO_OTHER_REPO_TODO,
        description: "Move a ticket from any column to another repository's To-do, renumbering it there.",
        capability: Capability::TicketStore,
        parameters: || {
            json!({
                "type": "object",
                "properties": {
                    "ticket_id": { "type": "string", "description": "Display id, number, or UUID" },
                    "target_repo_full_name": { "type": "string", "description": "Target repository as owner/name" }
                },
                "required": ["ticket_id", "target_repo_full_name"]
            })
        },
    },
    ToolSpec {
        name: LIST_TICKETS_BY_COLUMN,
        description: "List tickets in a Kanban column (e.g. col-unassigned, col-todo), in board order.",
        capability: Capability::TicketStore,
        parameters: || {
            json!({
                "type": "object",
                "properties": {
                    "column_id": { "type": "string", "description": "Kanban column id" }
                },
                "required": ["column_id"]
            })
        },
    },
    ToolSpec {
        name: LIST_AVAILABLE_REPOS,
        description: "List repositories that tickets can belong to.",
        capability: Capability::TicketStore,
        parameters: || json!({ "type": "object", "properties": {} }),
    },
];

fn ticket_id_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "ticket_id": { "type": "string", "description": "Display id (HAL-0012), number, or UUID" }
        },
        "required": ["ticket_id"]
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of one tool call.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub output: Value,
    pub is_error: bool,
    /// Set by repository tools; folded into the turn result by the runner.
    pub repo_usage: Option<RepoUsage>,
}

impl ToolOutcome {
    fn ok(mut output: Value) -> Self {
        if let Value::Object(map) = &mut output {
            map.insert("success".into(), Value::Bool(true));
        }
        Self {
            output,
            is_error: false,
            repo_usage: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            output: json!({ "success": false, "error": message.into() }),
            is_error: true,
            repo_usage: None,
        }
    }

    fn with_usage(mut self, usage: RepoUsage) -> Self {
        self.repo_usage = Some(usage);
        self
    }
}

pub struct ToolRegistry {
    repo: Arc<dyn RepoInspector>,
    tickets: Option<TicketManager>,
}

impl ToolRegistry {
    pub fn new(repo: Arc<dyn RepoInspector>, tickets: Option<TicketManager>) -> Self {
        Self { repo, tickets }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            repo: true,
            readiness: true,
            ticket_store: self.tickets.is_some(),
        }
    }

    /// Definitions offered to the model this turn.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let caps = self.capabilities();
        TOOL_SPECS
            .iter()
            .filter(|spec| caps.allows(spec.capability))
            .map(|spec| ToolDefinition {
                name: spec.name.into(),
                description: spec.description.into(),
                parameters: (spec.parameters)(),
            })
            .collect()
    }

    /// Run one tool call. Unknown or disabled tools produce an error value.
    pub async fn dispatch(&self, tool_name: &str, arguments: &Value) -> ToolOutcome {
        let Some(spec) = TOOL_SPECS.iter().find(|s| s.name == tool_name) else {
            return ToolOutcome::err(format!("unknown tool '{tool_name}'"));
        };
        if !self.capabilities().allows(spec.capability) {
            return ToolOutcome::err(format!(
                "tool '{tool_name}' is unavailable: no ticket store is configured"
            ));
        }

        match spec.capability {
            Capability::Repo => self.dispatch_repo(tool_name, arguments).await,
            Capability::Readiness => dispatch_evaluate(arguments),
            Capability::TicketStore => match &self.tickets {
                Some(tickets) => dispatch_ticket(tickets, tool_name, arguments).await,
                None => ToolOutcome::err("no ticket store is configured"),
            },
        }
    }

    // ── repository tools ─────────────────────────────────────────────

    async fn dispatch_repo(&self, tool_name: &str, arguments: &Value) -> ToolOutcome {
        let source = self.repo.source();
        let usage = |path: &str| RepoUsage {
            tool: tool_name.to_string(),
            source,
            path: path.to_string(),
        };

        match tool_name {
            LIST_DIRECTORY => {
                let req: ListDirectoryRequest = match parse_args(tool_name, arguments) {
                    Ok(r) => r,
                    Err(e) => return e,
                };
                let path = req.path.clone();
                finish(self.repo.list_directory(req).await).with_usage(usage(&path))
            }
            READ_FILE => {
                let req: ReadFileRequest = match parse_args(tool_name, arguments) {
                    Ok(r) => r,
                    Err(e) => return e,
                };
                let path = req.path.clone();
                finish(self.repo.read_file(req).await).with_usage(usage(&path))
            }
            SEARCH_FILES => {
                let req: SearchFilesRequest = match parse_args(tool_name, arguments) {
                    Ok(r) => r,
                    Err(e) => return e,
                };
                let path = req.glob.clone().unwrap_or_else(|| ".".into());
                finish(self.repo.search_files(req).await).with_usage(usage(&path))
            }
            other => ToolOutcome::err(format!("unknown tool '{other}'")),
        }
    }
}

fn finish(result: Result<Value, String>) -> ToolOutcome {
    match result {
        Ok(v) => ToolOutcome::ok(v),
        Err(e) => ToolOutcome::err(e),
    }
}

fn parse_args<T: DeserializeOwned>(tool_name: &str, arguments: &Value) -> Result<T, ToolOutcome> {
    T::deserialize(arguments)
        .map_err(|e| ToolOutcome::err(format!("invalid {tool_name} arguments: {e}")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ticket tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Deserialize)]
struct CreateTicketArgs {
    title: String,
    body_md: String,
}

#[derive(Deserialize)]
struct TicketIdArgs {
    ticket_id: String,
}

#[derive(Deserialize)]
struct BodyArgs {
    body_md: String,
}

#[derive(Deserialize)]
struct UpdateBodyArgs {
    ticket_id: String,
    body_md: String,
}

#[derive(Deserialize)]
struct OtherRepoMoveArgs {
    ticket_id: String,
    target_repo_full_name: String,
}

#[derive(Deserialize)]
struct ColumnArgs {
    column_id: String,
}

/// Board-level view of a ticket for listings.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TicketSummary {
    ticket_id: String,
    display_id: String,
    title: String,
    repo_full_name: Option<String>,
    position: Option<i64>,
}

impl From<&Ticket> for TicketSummary {
    fn from(t: &Ticket) -> Self {
        Self {
            ticket_id: t.pk.clone(),
            display_id: t.label(),
            title: t.title.clone(),
            repo_full_name: t.repo_full_name.clone(),
            position: t.kanban_position,
        }
    }
}

fn dispatch_evaluate(arguments: &Value) -> ToolOutcome {
    let args: BodyArgs = match parse_args(EVALUATE_TICKET_READY, arguments) {
        Ok(a) => a,
        Err(e) => return e,
    };
    serialized(&pm_tickets::evaluate_ready(&args.body_md))
}

async fn dispatch_ticket(tickets: &TicketManager, tool_name: &str, arguments: &Value) -> ToolOutcome {
    match tool_name {
        CREATE_TICKET => {
            let args: CreateTicketArgs = match parse_args(tool_name, arguments) {
                Ok(a) => a,
                Err(e) => return e,
            };
            settle(tickets.create(&args.title, &args.body_md).await)
        }
        FETCH_TICKET_CONTENT => {
            let args: TicketIdArgs = match parse_args(tool_name, arguments) {
                Ok(a) => a,
                Err(e) => return e,
            };
            match tickets.fetch(&args.ticket_id).await {
                Ok(t) => ToolOutcome::ok(json!({
                    "displayId": t.label(),
                    "ticketId": t.pk,
                    "title": t.title,
                    "bodyMd": t.body_md,
                    "repoFullName": t.repo_full_name,
                    "columnId": t.kanban_column_id,
                    "position": t.kanban_position,
                })),
                Err(e) => ticket_error(e),
            }
        }
        UPDATE_TICKET_BODY => {
            let args: UpdateBodyArgs = match parse_args(tool_name, arguments) {
                Ok(a) => a,
                Err(e) => return e,
            };
            settle(tickets.update_body(&args.ticket_id, &args.body_md).await)
        }
        MOVE_TICKET_TO_TODO => {
            let args: TicketIdArgs = match parse_args(tool_name, arguments) {
                Ok(a) => a,
                Err(e) => return e,
            };
            settle(tickets.move_to_todo(&args.ticket_id).await)
        }
        MOVE_TICKET_TO_OTHER_REPO_TODO => {
            let args: OtherRepoMoveArgs = match parse_args(tool_name, arguments) {
                Ok(a) => a,
                Err(e) => return e,
            };
            settle(
                tickets
                    .move_to_other_repo_todo(&args.ticket_id, &args.target_repo_full_name)
                    .await,
            )
        }
        LIST_TICKETS_BY_COLUMN => {
            let args: ColumnArgs = match parse_args(tool_name, arguments) {
                Ok(a) => a,
                Err(e) => return e,
            };
            match tickets.list_by_column(&args.column_id).await {
                Ok(rows) => {
                    let summaries: Vec<TicketSummary> = rows.iter().map(TicketSummary::from).collect();
                    ToolOutcome::ok(json!({
                        "columnId": args.column_id.trim(),
                        "count": summaries.len(),
                        "tickets": summaries,
                    }))
                }
                Err(e) => ticket_error(e),
            }
        }
        LIST_AVAILABLE_REPOS => match tickets.list_repos().await {
            Ok(repos) => ToolOutcome::ok(json!({ "repos": repos })),
            Err(e) => ticket_error(e),
        },
        other => ToolOutcome::err(format!("unknown tool '{other}'")),
    }
}

fn settle<T: Serialize>(result: Result<T, TicketError>) -> ToolOutcome {
    match result {
        Ok(v) => serialized(&v),
        Err(e) => ticket_error(e),
    }
}

fn serialized<T: Serialize>(value: &T) -> ToolOutcome {
    match serde_json::to_value(value) {
        Ok(v) => ToolOutcome::ok(v),
        Err(e) => ToolOutcome::err(format!("failed to encode tool result: {e}")),
    }
}

fn ticket_error(e: TicketError) -> ToolOutcome {
    let mut outcome = ToolOutcome::err(e.to_string());
    if let (TicketError::NotReady { missing, .. }, Value::Object(map)) = (&e, &mut outcome.output) {
        map.insert("missingItems".into(), json!(missing));
    }
    outcome
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
