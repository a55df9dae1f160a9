//! Definition-of-Ready evaluation.
//!
//! A body is ready when the five required `##` sections are present and
//! populated, Goal and Deliverable carry no placeholders, Acceptance
//! criteria has at least one `- [ ]` line, and no `<placeholder>` token
//! remains anywhere in the body.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

pub const SECTION_GOAL: &str = "Goal";
pub const SECTION_DELIVERABLE: &str = "Human-verifiable deliverable";
pub const SECTION_ACCEPTANCE: &str = "Acceptance criteria";
pub const SECTION_CONSTRAINTS: &str = "Constraints";
pub const SECTION_NON_GOALS: &str = "Non-goals";

pub const REQUIRED_SECTIONS: [&str; 5] = [
    SECTION_GOAL,
    SECTION_DELIVERABLE,
    SECTION_ACCEPTANCE,
    SECTION_CONSTRAINTS,
    SECTION_NON_GOALS,
];

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[A-Za-z0-9_\s-]+>").expect("static regex"));

/// Per-check booleans, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistResults {
    pub goal: bool,
    pub deliverable: bool,
    pub acceptance_criteria: bool,
    pub constraints: bool,
    pub non_goals: bool,
    pub no_placeholders: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResult {
    pub ready: bool,
    pub missing_items: Vec<String>,
    pub checklist_results: ChecklistResults,
}

/// Every distinct placeholder token in `text`, in order of appearance.
pub fn find_placeholders(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in PLACEHOLDER_RE.find_iter(text) {
        let token = m.as_str().to_string();
        if !found.contains(&token) {
            found.push(token);
        }
    }
    found
}

/// Content of the `## {name}` section, up to the next `#` or `##` heading.
/// `None` when the heading is absent.
pub fn section_content(body: &str, name: &str) -> Option<String> {
    let mut lines = body.lines();
    lines.by_ref().find(|l| is_heading(l, 2) && heading_text(l) == name)?;
    let content: Vec<&str> = lines
        .take_while(|l| !is_heading(l, 1) && !is_heading(l, 2))
        .collect();
    Some(content.join("\n"))
}

/// True for `#`-level `level` headings (`# x`, `## x`), not deeper.
pub(crate) fn is_heading(line: &str, level: usize) -> bool {
    let line = line.trim_end();
    let hashes = line.chars().take_while(|c| *c == '#').count();
    hashes == level && line[hashes..].starts_with(' ')
}

pub(crate) fn heading_text(line: &str) -> &str {
    line.trim_start_matches('#').trim()
}

pub(crate) fn has_unchecked_box(section: &str) -> bool {
    section.lines().any(|l| l.trim_start().starts_with("- [ ]"))
}

/// Evaluate a ticket body against the Definition of Ready.
pub fn evaluate_ready(body: &str) -> ReadinessResult {
    let mut missing = Vec::new();

    let populated = |name: &str| {
        section_content(body, name)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    };

    let prose_check = |name: &str, missing: &mut Vec<String>| -> bool {
        match populated(name) {
            None => {
                missing.push(format!("{name} section is missing or empty"));
                false
            }
            Some(c) => {
                let ph = find_placeholders(&c);
                if ph.is_empty() {
                    true
                } else {
                    missing.push(format!("{name} contains placeholders: {}", ph.join(", ")));
                    false
                }
            }
        }
    };

    let goal = prose_check(SECTION_GOAL, &mut missing);
    let deliverable = prose_check(SECTION_DELIVERABLE, &mut missing);

    let acceptance_criteria = match populated(SECTION_ACCEPTANCE) {
        Some(c) if has_unchecked_box(&c) => true,
        Some(_) => {
            missing.push(format!(
                "{SECTION_ACCEPTANCE} needs at least one unchecked checkbox line (- [ ])"
            ));
            false
        }
        None => {
            missing.push(format!("{SECTION_ACCEPTANCE} section is missing or empty"));
            false
        }
    };

    let non_empty = |name: &str, missing: &mut Vec<String>| -> bool {
        let ok = populated(name).is_some();
        if !ok {
            missing.push(format!("{name} section is missing or empty"));
        }
        ok
    };
    let constraints = non_empty(SECTION_CONSTRAINTS, &mut missing);
    let non_goals = non_empty(SECTION_NON_GOALS, &mut missing);

    let placeholders = find_placeholders(body);
    let no_placeholders = placeholders.is_empty();
    if !no_placeholders {
        missing.push(format!("Unresolved placeholders: {}", placeholders.join(", ")));
    }

    let checklist_results = ChecklistResults {
        goal,
        deliverable,
        acceptance_criteria,
        constraints,
        non_goals,
        no_placeholders,
    };
    let ready = goal && deliverable && acceptance_criteria && constraints && non_goals && no_placeholders;

    ReadinessResult {
        ready,
        missing_items: missing,
        checklist_results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const READY_BODY: &str = "\
# Fix login

## Goal
Users can sign in with their email address.

## Human-verifiable deliverable
The login form accepts a valid email and password and lands on the dashboard.

## Acceptance criteria
- [ ] Works

## Constraints
No new dependencies.

## Non-goals
Social login.
";

    #[test]
    fn populated_body_is_ready() {
        let r = evaluate_ready(READY_BODY);
        assert!(r.ready, "missing: {:?}", r.missing_items);
        assert!(r.missing_items.is_empty());
        assert!(r.checklist_results.no_placeholders);
    }

    #[test]
    fn plain_bullets_are_not_ready() {
        let body = READY_BODY.replace("- [ ] Works", "- Works");
        let r = evaluate_ready(&body);
        assert!(!r.ready);
        assert!(!r.checklist_results.acceptance_criteria);
        assert!(r.missing_items[0].contains("- [ ]"));
    }

    #[test]
    fn checked_boxes_alone_do_not_count() {
        let body = READY_BODY.replace("- [ ] Works", "- [x] Works");
        assert!(!evaluate_ready(&body).ready);
    }

    #[test]
    fn placeholder_outside_sections_blocks_readiness() {
        let body = format!("{READY_BODY}\n## Notes\nOwner: <team name>\n");
        let r = evaluate_ready(&body);
        assert!(!r.ready);
        assert!(r.checklist_results.goal);
        assert!(!r.checklist_results.no_placeholders);
        assert_eq!(r.missing_items, vec!["Unresolved placeholders: <team name>".to_string()]);
    }

    #[test]
    fn placeholder_in_goal_is_reported_for_goal() {
        let body = READY_BODY.replace(
            "Users can sign in with their email address.",
            "<what should happen>",
        );
        let r = evaluate_ready(&body);
        assert!(!r.checklist_results.goal);
        assert!(r.missing_items[0].starts_with("Goal contains placeholders"));
    }

    #[test]
    fn missing_sections_are_listed() {
        let r = evaluate_ready("# Only a title\n\n## Goal\nSomething.\n");
        assert!(!r.ready);
        assert_eq!(r.missing_items.len(), 4);
    }

    #[test]
    fn section_ends_at_next_heading() {
        let body = "## Constraints\n\n## Non-goals\nNone.\n";
        assert_eq!(section_content(body, SECTION_CONSTRAINTS).unwrap().trim(), "");
        assert_eq!(section_content(body, SECTION_NON_GOALS).unwrap().trim(), "None.");
    }

    #[test]
    fn subheadings_stay_inside_section() {
        let body = "## Constraints\n### Performance\nUnder 100ms.\n## Non-goals\nx\n";
        assert!(section_content(body, SECTION_CONSTRAINTS)
            .unwrap()
            .contains("Under 100ms."));
    }

    #[test]
    fn heading_match_is_exact() {
        let body = READY_BODY.replace("## Goal", "## Goals");
        assert!(!evaluate_ready(&body).checklist_results.goal);
    }

    #[test]
    fn evaluation_is_idempotent() {
        assert_eq!(evaluate_ready(READY_BODY), evaluate_ready(READY_BODY));
        let bad = READY_BODY.replace("- [ ] Works", "- Works");
        assert_eq!(evaluate_ready(&bad), evaluate_ready(&bad));
    }

    #[test]
    fn placeholders_are_deduplicated() {
        assert_eq!(
            find_placeholders("<a> and <a> and <b-c>"),
            vec!["<a>".to_string(), "<b-c>".to_string()]
        );
    }
}
