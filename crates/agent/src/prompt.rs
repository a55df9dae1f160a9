//! System instructions for the Project Manager agent.

use crate::tools::Capabilities;

const BASE_INSTRUCTIONS: &str = "\
You are the Project Manager agent for a software project. You answer questions \
about the codebase, inspect tickets, and keep the Kanban board tidy.

Working rules:
- Ground answers in the repository. Use list_directory, read_file and search_files \
before stating facts about code you have not seen in the context pack.
- Tickets follow the TICKET_TEMPLATE in the context pack. A ticket is ready only when \
Goal, Human-verifiable deliverable, Acceptance criteria (with at least one `- [ ]` \
checkbox), Constraints and Non-goals are filled in and no <placeholder> tokens remain.
- Never invent ticket ids. Use the ids returned by tools.
- Only tickets in Unassigned may be moved to To-do in the same repository; use the \
cross-repository move for tickets in other columns or other repositories.
- When a tool reports an error, tell the user what failed and quote the error.
- Reply concisely in markdown.";

const NO_STORE_NOTE: &str = "\
The ticket store is not configured for this session. You cannot create, fetch, update, \
list or move tickets; say so if asked, and offer to draft the ticket body instead.";

/// Compose the system message for one turn.
pub fn system_prompt(caps: Capabilities, extra_instructions: Option<&str>) -> String {
    let mut prompt = String::from(BASE_INSTRUCTIONS);
    if !caps.ticket_store {
        prompt.push_str("\n\n");
        prompt.push_str(NO_STORE_NOTE);
    }
    if let Some(extra) = extra_instructions.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("\n\n");
        prompt.push_str(extra);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_missing_store_and_appends_extras() {
        let caps = Capabilities {
            repo: true,
            readiness: true,
            ticket_store: false,
        };
        let prompt = system_prompt(caps, Some("  Answer in French.  "));
        assert!(prompt.contains("not configured"));
        assert!(prompt.ends_with("Answer in French."));

        let caps = Capabilities {
            ticket_store: true,
            ..caps
        };
        assert!(!system_prompt(caps, None).contains("not configured"));
    }
}
