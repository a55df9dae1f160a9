use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use pm_agent::runner::{Runner, TurnInput, TurnPhase};
use pm_agent::tools::ToolRegistry;
use pm_contextpack::ContextPackBuilder;
use pm_domain::config::{ContextConfig, ProjectConfig};
use pm_domain::error::{Error, Result};
use pm_domain::ticket::COL_TODO;
use pm_domain::tool::{ContentPart, MessageContent, Role, ToolCall, Usage};
use pm_providers::{ChatRequest, ChatResponse, LlmProvider};
use pm_tickets::{MemoryTicketStore, TicketManager};
use pm_tools::{InspectLimits, LocalRepo, UsageSource};

// ── Scripted provider ────────────────────────────────────────────────

/// Replays canned responses and remembers every request it saw.
struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ChatResponse>>>,
    seen: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    fn new(script: Vec<Result<ChatResponse>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.seen.lock().clone()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.seen.lock().push(req.clone());
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(text("script exhausted")))
    }

    fn request_body(&self, req: &ChatRequest) -> Value {
        json!({
            "model": "scripted",
            "messages": req.messages.len(),
            "tools": req.tools.iter().map(|t| t.name.clone()).collect::<Vec<_>>(),
            "api_key": "sk-abcdefghijklmnopqrstuvwxy",
        })
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted"
    }
}

fn text(content: &str) -> ChatResponse {
    ChatResponse {
        content: content.into(),
        model: "scripted".into(),
        response_id: Some("resp_final".into()),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        ..ChatResponse::default()
    }
}

fn calls(list: &[(&str, Value)]) -> ChatResponse {
    ChatResponse {
        tool_calls: list
            .iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCall {
                call_id: format!("call_{i}"),
                tool_name: name.to_string(),
                arguments: args.clone(),
            })
            .collect(),
        model: "scripted".into(),
        ..ChatResponse::default()
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────

const READY_BODY: &str = "\
## Goal
Users can sign in.

## Human-verifiable deliverable
Login lands on the dashboard.

## Acceptance criteria
- [ ] Works

## Constraints
None.

## Non-goals
SSO.
";

struct Fixture {
    _dir: tempfile::TempDir,
    store: Arc<MemoryTicketStore>,
    runner: Runner,
}

fn fixture(provider: Arc<ScriptedProvider>, with_store: bool, max_iterations: usize) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("docs")).unwrap();
    std::fs::write(
        dir.path().join("docs/notes.md"),
        "# Notes\nTODO: first\nnothing\nTODO: second\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("main.rs"), "// TODO: not markdown\n").unwrap();

    let project = ProjectConfig {
        root: dir.path().to_path_buf(),
        repo_full_name: Some("acme/hal-portal".into()),
        ..ProjectConfig::default()
    };
    let store = Arc::new(MemoryTicketStore::new());
    let tickets = with_store.then(|| TicketManager::new(store.clone(), project.repo_full_name.clone()));
    let repo = Arc::new(LocalRepo::new(dir.path(), InspectLimits::default()));
    let registry = Arc::new(ToolRegistry::new(repo, tickets));

    let runner = Runner::new(
        provider,
        ContextPackBuilder::new(project, &ContextConfig::default()),
        registry,
        max_iterations,
    );
    Fixture {
        _dir: dir,
        store,
        runner,
    }
}

fn input(message: &str) -> TurnInput {
    TurnInput {
        message: message.into(),
        ..TurnInput::default()
    }
}

// ── Scenarios ────────────────────────────────────────────────────────

#[tokio::test]
async fn tool_loop_creates_ticket_and_returns_model_reply() {
    let provider = ScriptedProvider::new(vec![
        Ok(calls(&[(
            "create_ticket",
            json!({ "title": "Fix login", "body_md": READY_BODY }),
        )])),
        Ok(text("Created PORTAL-0001.")),
    ]);
    let fx = fixture(provider.clone(), true, 10);

    let result = fx.runner.run(input("Please file a login ticket")).await.unwrap();

    assert_eq!(result.reply, "Created PORTAL-0001.");
    assert!(!result.used_fallback);
    assert_eq!(result.iterations, 1);
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].output["success"], json!(true));
    assert_eq!(result.tool_calls[0].output["movedToTodo"], json!(true));
    assert_eq!(result.response_id.as_deref(), Some("resp_final"));
    assert_eq!(result.usage.total_tokens, 15);

    let row = fx.store.all().pop().unwrap();
    assert_eq!(row.kanban_column_id.as_deref(), Some(COL_TODO));
    assert_eq!(row.kanban_position, Some(0));

    // Second request carries the assistant tool call and its result.
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    let last = requests[1].messages.last().unwrap();
    assert_eq!(last.role, Role::Tool);
    match &last.content {
        MessageContent::Parts(parts) => assert!(matches!(
            &parts[0],
            ContentPart::ToolResult { tool_use_id, is_error: false, .. } if tool_use_id == "call_0"
        )),
        other => panic!("unexpected tool message content: {other:?}"),
    }
}

#[tokio::test]
async fn first_outbound_request_is_captured_redacted() {
    let provider = ScriptedProvider::new(vec![
        Ok(calls(&[("list_directory", json!({ "path": "." }))])),
        Ok(text("Done.")),
    ]);
    let fx = fixture(provider, false, 10);

    let result = fx.runner.run(input("What is in the repo?")).await.unwrap();

    let captured = result.outbound_request.unwrap();
    assert_eq!(captured["api_key"], json!("[REDACTED]"));
    assert_eq!(captured["messages"], json!(2));
}

#[tokio::test]
async fn empty_reply_uses_fallback_from_tool_record() {
    let provider = ScriptedProvider::new(vec![
        Ok(calls(&[("kanban_move_ticket_to_todo", json!({ "ticket_id": "0099" }))])),
        Ok(text("   ")),
    ]);
    let fx = fixture(provider, true, 10);

    let result = fx.runner.run(input("move 0099 to todo")).await.unwrap();

    assert!(result.used_fallback);
    assert_eq!(result.tool_calls[0].output["success"], json!(false));
    assert!(result.reply.contains("not found"), "{}", result.reply);
}

#[tokio::test]
async fn round_trip_cap_ends_the_turn() {
    let looping = || Ok(calls(&[("list_directory", json!({ "path": "docs" }))]));
    let provider = ScriptedProvider::new(vec![looping(), looping(), looping(), looping()]);
    let fx = fixture(provider.clone(), false, 2);

    let result = fx.runner.run(input("keep looking")).await.unwrap();

    assert_eq!(result.iterations, 2);
    assert_eq!(result.tool_calls.len(), 2);
    assert_eq!(provider.requests().len(), 3);
    assert!(result.used_fallback);
}

#[tokio::test]
async fn search_reports_markdown_matches_and_repo_usage() {
    let provider = ScriptedProvider::new(vec![
        Ok(calls(&[(
            "search_files",
            json!({ "pattern": "TODO", "glob": "**/*.md" }),
        )])),
        Ok(text("Two TODOs.")),
    ]);
    let fx = fixture(provider, false, 10);

    let result = fx.runner.run(input("find todos")).await.unwrap();

    let output = &result.tool_calls[0].output;
    let matches = output["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 2);
    assert!(matches.iter().all(|m| m["path"].as_str().unwrap().ends_with(".md")));
    assert_eq!(matches[0]["line"], json!(2));
    assert_eq!(matches[1]["line"], json!(4));

    assert_eq!(result.repo_usage.len(), 1);
    assert_eq!(result.repo_usage[0].tool, "search_files");
    assert_eq!(result.repo_usage[0].source, UsageSource::Local);
}

#[tokio::test]
async fn store_tools_are_absent_without_a_store() {
    let provider = ScriptedProvider::new(vec![Ok(text("Hello."))]);
    let fx = fixture(provider.clone(), false, 10);

    fx.runner.run(input("hi")).await.unwrap();

    let tools: Vec<String> = provider.requests()[0]
        .tools
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert!(tools.contains(&"read_file".to_string()));
    assert!(tools.contains(&"evaluate_ticket_ready".to_string()));
    assert!(!tools.contains(&"create_ticket".to_string()));
}

#[tokio::test]
async fn completion_failure_is_tagged_openai() {
    let provider = ScriptedProvider::new(vec![Err(Error::Provider {
        provider: "scripted".into(),
        message: "503 upstream".into(),
    })]);
    let fx = fixture(provider, false, 10);

    let err = fx.runner.run(input("hi")).await.unwrap_err();
    assert_eq!(err.phase, TurnPhase::Openai);
    assert!(err.message.contains("503"));
}

#[tokio::test]
async fn missing_root_still_reaches_the_model() {
    let provider = ScriptedProvider::new(vec![Ok(text("Nothing to see yet."))]);
    let project = ProjectConfig {
        root: "/nonexistent/pm-agent-root".into(),
        ..ProjectConfig::default()
    };
    let repo = Arc::new(LocalRepo::new("/nonexistent/pm-agent-root", InspectLimits::default()));
    let runner = Runner::new(
        provider.clone(),
        ContextPackBuilder::new(project, &ContextConfig::default()),
        Arc::new(ToolRegistry::new(repo, None)),
        10,
    );

    let result = runner.run(input("hi")).await.unwrap();
    assert_eq!(result.reply, "Nothing to see yet.");
    assert!(!result.context_report.vcs_status_available);
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test]
async fn tool_errors_are_returned_to_the_model() {
    let provider = ScriptedProvider::new(vec![
        Ok(calls(&[("read_file", json!({ "path": "../secrets.txt" }))])),
        Ok(text("That path is outside the project.")),
    ]);
    let fx = fixture(provider.clone(), false, 10);

    let result = fx.runner.run(input("read ../secrets.txt")).await.unwrap();
    assert_eq!(result.reply, "That path is outside the project.");
    assert_eq!(result.tool_calls[0].output["success"], json!(false));

    let last = provider.requests()[1].messages.last().cloned().unwrap();
    match last.content {
        MessageContent::Parts(parts) => assert!(matches!(
            &parts[0],
            ContentPart::ToolResult { is_error: true, .. }
        )),
        other => panic!("unexpected tool message content: {other:?}"),
    }
}
