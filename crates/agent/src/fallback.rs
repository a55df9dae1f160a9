//! Fallback reply for turns where the model acted but produced no text.
//!
//! Rules are tried in priority order; each one looks for the most recent
//! matching tool call and describes it. The first rule with a match wins.

use serde::Serialize;
use serde_json::Value;

use crate::tools::{
    CREATE_TICKET, EVALUATE_TICKET_READY, FETCH_TICKET_CONTENT, LIST_AVAILABLE_REPOS,
    LIST_DIRECTORY, LIST_TICKETS_BY_COLUMN, MOVE_TICKET_TO_OTHER_REPO_TODO, MOVE_TICKET_TO_TODO,
    READ_FILE, SEARCH_FILES, UPDATE_TICKET_BODY,
};

/// One executed tool call, kept for diagnostics and the fallback reply.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub input: Value,
    pub output: Value,
}

impl ToolCallRecord {
    fn succeeded(&self) -> bool {
        self.output.get("success").and_then(Value::as_bool) == Some(true)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.output.get(key).and_then(Value::as_str)
    }

    fn error(&self) -> &str {
        self.str_field("error").unwrap_or("unknown error")
    }

    fn ticket_ref(&self) -> &str {
        self.str_field("displayId")
            .or_else(|| self.input.get("ticket_id").and_then(Value::as_str))
            .unwrap_or("the ticket")
    }
}

struct FallbackRule {
    applies: fn(&ToolCallRecord) -> bool,
    describe: fn(&ToolCallRecord) -> String,
}

const RULES: &[FallbackRule] = &[
    FallbackRule {
        applies: |r| r.name == CREATE_TICKET && r.succeeded(),
        describe: describe_created,
    },
    FallbackRule {
        applies: |r| r.name == CREATE_TICKET && !r.succeeded(),
        describe: |r| format!("I couldn't create the ticket: {}.", r.error()),
    },
    FallbackRule {
        applies: |r| is_move(r) && r.succeeded(),
        describe: |r| {
            let position = r.output.get("position").and_then(Value::as_i64).unwrap_or(0);
            match r.str_field("repoFullName").filter(|_| r.name == MOVE_TICKET_TO_OTHER_REPO_TODO) {
                Some(repo) => format!(
                    "I moved the ticket to To-do in {repo} as {} (position {position}).",
                    r.ticket_ref()
                ),
                None => format!("I moved {} to To-do (position {position}).", r.ticket_ref()),
            }
        },
    },
    FallbackRule {
        applies: |r| is_move(r) && !r.succeeded(),
        describe: |r| format!("I couldn't move {}: {}.", r.ticket_ref(), r.error()),
    },
    FallbackRule {
        applies: |r| r.name == UPDATE_TICKET_BODY && r.succeeded(),
        describe: |r| {
            if r.output.get("ready").and_then(Value::as_bool) == Some(true) {
                format!("I updated {}; it now meets the Definition of Ready.", r.ticket_ref())
            } else {
                format!(
                    "I updated {}. It is not ready yet; missing: {}.",
                    r.ticket_ref(),
                    missing_items(&r.output)
                )
            }
        },
    },
    FallbackRule {
        applies: |r| r.name == UPDATE_TICKET_BODY && !r.succeeded(),
        describe: |r| format!("I couldn't update {}: {}.", r.ticket_ref(), r.error()),
    },
    FallbackRule {
        applies: |r| r.name == EVALUATE_TICKET_READY && r.succeeded(),
        describe: |r| {
            if r.output.get("ready").and_then(Value::as_bool) == Some(true) {
                "The ticket body meets the Definition of Ready.".into()
            } else {
                format!("The ticket body is not ready; missing: {}.", missing_items(&r.output))
            }
        },
    },
    FallbackRule {
        applies: |r| r.name == LIST_TICKETS_BY_COLUMN && r.succeeded(),
        describe: |r| {
            let column = r.str_field("columnId").unwrap_or("the column");
            let ids: Vec<&str> = r
                .output
                .get("tickets")
                .and_then(Value::as_array)
                .map(|ts| ts.iter().filter_map(|t| t.get("displayId")?.as_str()).collect())
                .unwrap_or_default();
            if ids.is_empty() {
                format!("There are no tickets in {column}.")
            } else {
                format!("{column} has {} ticket(s): {}.", ids.len(), ids.join(", "))
            }
        },
    },
    FallbackRule {
        applies: |r| r.name == LIST_AVAILABLE_REPOS && r.succeeded(),
        describe: |r| {
            let repos: Vec<&str> = r
                .output
                .get("repos")
                .and_then(Value::as_array)
                .map(|rs| rs.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            if repos.is_empty() {
                "No repositories are available yet.".into()
            } else {
                format!("Available repositories: {}.", repos.join(", "))
            }
        },
    },
    FallbackRule {
        applies: |r| r.name == FETCH_TICKET_CONTENT && r.succeeded(),
        describe: |r| {
            format!(
                "I fetched {}: \"{}\".",
                r.ticket_ref(),
                r.str_field("title").unwrap_or_default()
            )
        },
    },
    FallbackRule {
        applies: |r| !r.succeeded(),
        describe: |r| format!("The {} tool failed: {}.", r.name, r.error()),
    },
    FallbackRule {
        applies: |r| matches!(r.name.as_str(), LIST_DIRECTORY | READ_FILE | SEARCH_FILES),
        describe: |_| {
            "I looked through the repository but didn't produce a summary. Could you rephrase the question?"
                .into()
        },
    },
];

fn is_move(r: &ToolCallRecord) -> bool {
    r.name == MOVE_TICKET_TO_TODO || r.name == MOVE_TICKET_TO_OTHER_REPO_TODO
}

fn missing_items(output: &Value) -> String {
    let items: Vec<&str> = output
        .get("missingItems")
        .and_then(Value::as_array)
        .map(|v| v.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if items.is_empty() {
        "unspecified items".into()
    } else {
        items.join("; ")
    }
}

fn describe_created(r: &ToolCallRecord) -> String {
    let id = r.ticket_ref();
    let mut reply = if r.output.get("movedToTodo").and_then(Value::as_bool) == Some(true) {
        format!("I created {id} and moved it to To-do.")
    } else if r.output.get("ready").and_then(Value::as_bool) == Some(true) {
        format!("I created {id}; it is ready but is still in Unassigned.")
    } else {
        format!(
            "I created {id} in Unassigned. It is not ready yet; missing: {}.",
            missing_items(&r.output)
        )
    };
    if let Some(err) = r.str_field("moveError") {
        reply.push_str(&format!(" Moving it to To-do failed: {err}."));
    }
    reply
}

/// Build the fallback reply from the turn's tool calls.
pub fn fallback_reply(records: &[ToolCallRecord]) -> String {
    for rule in RULES {
        if let Some(record) = records.iter().rev().find(|r| (rule.applies)(r)) {
            return (rule.describe)(record);
        }
    }
    if records.is_empty() {
        "I wasn't able to produce a reply. Please try rephrasing your request.".into()
    } else {
        "I ran the requested tools but have nothing further to report.".into()
    }
}
