//! `pm-agent chat`: interactive REPL command.
//!
//! Opens a readline loop that sends each line to the agent as one turn.
//! The session keeps the conversation window so follow-up questions have
//! context.

use pm_contextpack::ConversationTurn;
use pm_domain::config::Config;

use crate::bootstrap;
use crate::runner::{Runner, TurnInput, TurnResult};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the REPL remembers between turns.
#[derive(Debug, Default)]
pub struct ChatSession {
    history: Vec<ConversationTurn>,
}

impl ChatSession {
    pub fn input_for(&self, message: &str) -> TurnInput {
        TurnInput {
            message: message.to_string(),
            history: self.history.clone(),
            ..TurnInput::default()
        }
    }

    pub fn record(&mut self, message: &str, result: &TurnResult) {
        self.history.push(ConversationTurn::user(message));
        self.history.push(ConversationTurn::assistant(result.reply.clone()));
        if let Some(id) = &result.response_id {
            tracing::debug!(response_id = %id, "turn recorded");
        }
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn turns(&self) -> usize {
        self.history.len() / 2
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run the interactive chat REPL.
pub async fn chat(config: &Config) -> anyhow::Result<()> {
    let runner = bootstrap::build_runner(config)?;
    let mut session = ChatSession::default();
    let mut rl = rustyline::DefaultEditor::new()?;

    // Banner goes to stderr to keep stdout clean for replies.
    eprintln!("pm-agent interactive chat");
    eprintln!(
        "Project: {}  |  Type /help for commands, Ctrl+D to exit",
        config.project.root.display()
    );
    if !runner.tools().capabilities().ticket_store {
        eprintln!("(ticket store not configured: ticket tools are disabled)");
    }
    eprintln!();

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed.starts_with('/') {
                    if handle_slash_command(trimmed, &mut session, &runner) {
                        break;
                    }
                    continue;
                }

                if let Err(e) = send_message(&runner, &mut session, trimmed).await {
                    eprintln!("\x1B[31merror: {e}\x1B[0m");
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    eprintln!("Goodbye!");
    Ok(())
}

async fn send_message(
    runner: &Runner,
    session: &mut ChatSession,
    message: &str,
) -> anyhow::Result<()> {
    let result = runner.run(session.input_for(message)).await?;
    for call in &result.tool_calls {
        eprintln!("\x1b[2m[tool: {}]\x1b[0m", call.name);
    }
    println!("{}\n", result.reply);
    session.record(message, &result);
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slash command handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process a slash command.  Returns `true` if the REPL should exit.
fn handle_slash_command(input: &str, session: &mut ChatSession, runner: &Runner) -> bool {
    let cmd = input.split_whitespace().next().unwrap_or(input);

    match cmd {
        "/exit" | "/quit" => return true,
        "/clear" | "/reset" => {
            session.clear();
            eprintln!("Conversation cleared.");
        }
        "/tools" => {
            for def in runner.tools().definitions() {
                eprintln!("  {:<40} {}", def.name, def.description);
            }
        }
        "/history" => {
            eprintln!("{} turn(s) in this conversation.", session.turns());
        }
        "/help" => {
            eprintln!("Commands:");
            eprintln!("  /clear, /reset   Forget the conversation so far");
            eprintln!("  /tools           List the tools available this session");
            eprintln!("  /history         Show how many turns have been exchanged");
            eprintln!("  /exit, /quit     Leave the chat");
        }
        other => eprintln!("Unknown command: {other} (try /help)"),
    }
    false
}
