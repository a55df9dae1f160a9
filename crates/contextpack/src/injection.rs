//! Section formatting with machine-inspectable delimiters.

/// Literal used when `git status` cannot be run.
pub const STATUS_UNAVAILABLE: &str = "(status unavailable)";

/// Format the user's message for this turn.
pub fn format_inbound_message(message: &str) -> String {
    format!(
        "\
=== INBOUND_MESSAGE ===
{message}
=== END_INBOUND_MESSAGE ===
"
    )
}

/// Format the conversation block. `source` is `summary` or `window`.
pub fn format_conversation(content: &str, source: &str) -> String {
    format!(
        "\
=== CONVERSATION ===
SOURCE: {source}
--- BEGIN ---
{content}
--- END ---
"
    )
}

/// Format one repository rule document.
pub fn format_rule(name: &str, content: &str) -> String {
    format!(
        "\
=== RULE: {name} ===
--- BEGIN ---
{content}
--- END ---
"
    )
}

/// Placeholder when the rules directory is absent or empty.
pub fn format_rules_missing(dir: &str) -> String {
    format!(
        "\
=== RULES ===
(no rules found in {dir})
=== END_RULES ===
"
    )
}

/// Format a single project document (template, checklist). `None`
/// renders an explicit not-found placeholder.
pub fn format_document(label: &str, path: &str, content: Option<&str>) -> String {
    match content {
        Some(content) => format!(
            "\
=== {label}: {path} ===
--- BEGIN ---
{content}
--- END ---
"
        ),
        None => format!(
            "\
=== {label}: {path} ===
MISSING: true
--- BEGIN ---
(not found: {path})
--- END ---
"
        ),
    }
}

/// Format the version-control status snapshot.
pub fn format_vcs_status(status: Option<&str>) -> String {
    let body = status.unwrap_or(STATUS_UNAVAILABLE);
    format!(
        "\
=== GIT_STATUS ===
{body}
=== END_GIT_STATUS ===
"
    )
}
