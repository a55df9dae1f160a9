//! Markdown normalisation applied before tickets are stored.

use std::sync::LazyLock;

use regex::Regex;

use crate::readiness::{
    has_unchecked_box, heading_text, is_heading, section_content, REQUIRED_SECTIONS,
    SECTION_ACCEPTANCE,
};

/// Leading display-id on a title line: `HAL-0012 — `, `0012: `, ...
static TITLE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z]{1,6}-\d{1,9}|\d{1,9})\s*(?:—|–|-|:)\s*").expect("static regex")
});

static PLAIN_BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)[-*+]\s+(.*)$").expect("static regex"));

static CHECKBOX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*+]\s+\[[ xX]\]").expect("static regex"));

/// Rewrite `# Goal`-style headings of required sections to `## Goal`.
/// Matching is case-insensitive; the canonical spelling is written back.
pub fn normalize_headings(body: &str) -> String {
    map_lines(body, |line| {
        if !is_heading(line, 1) {
            return None;
        }
        let text = heading_text(line);
        REQUIRED_SECTIONS
            .iter()
            .find(|s| s.eq_ignore_ascii_case(text))
            .map(|s| format!("## {s}"))
    })
}

/// Title text of the first `# ` line before any `##` heading, with any
/// display-id prefix removed.
pub fn extract_title(body: &str) -> Option<String> {
    title_line_index(body).map(|idx| {
        let line = body.lines().nth(idx).unwrap_or_default();
        strip_title_id(heading_text(line)).to_string()
    })
}

/// Set the title line to `# {label} — {title}`. When `insert` is true
/// and the body has no title line, one is prepended.
pub fn normalize_title_line(body: &str, label: &str, title: &str, insert: bool) -> String {
    let title = strip_title_id(title.trim());
    let new_line = format!("# {label} — {title}");
    match title_line_index(body) {
        Some(idx) => {
            let mut i = 0usize;
            map_lines(body, |_| {
                let hit = i == idx;
                i += 1;
                hit.then(|| new_line.clone())
            })
        }
        None if insert => format!("{new_line}\n\n{}", body.trim_start_matches('\n')),
        None => body.to_string(),
    }
}

/// True when Acceptance criteria has plain bullets but no `- [ ]` lines.
pub fn acceptance_uses_plain_bullets(body: &str) -> bool {
    match section_content(body, SECTION_ACCEPTANCE) {
        Some(section) => {
            !has_unchecked_box(&section)
                && section
                    .lines()
                    .any(|l| PLAIN_BULLET_RE.is_match(l) && !CHECKBOX_RE.is_match(l))
        }
        None => false,
    }
}

/// Convert plain bullets in Acceptance criteria to `- [ ]` checkboxes.
/// Lines already carrying a checkbox are left alone.
pub fn bullets_to_checkboxes(body: &str) -> String {
    let mut in_section = false;
    map_lines(body, |line| {
        if is_heading(line, 1) || is_heading(line, 2) {
            in_section = is_heading(line, 2) && heading_text(line) == SECTION_ACCEPTANCE;
            return None;
        }
        if !in_section || CHECKBOX_RE.is_match(line) {
            return None;
        }
        PLAIN_BULLET_RE
            .captures(line)
            .map(|c| format!("{}- [ ] {}", &c[1], &c[2]))
    })
}

/// `fix login bug!` → `fix-login-bug`, at most 40 characters.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let mut slug: String = slug.trim_end_matches('-').chars().take(40).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "ticket".into()
    } else {
        slug
    }
}

fn strip_title_id(text: &str) -> &str {
    match TITLE_ID_RE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

fn title_line_index(body: &str) -> Option<usize> {
    for (idx, line) in body.lines().enumerate() {
        if is_heading(line, 2) {
            return None;
        }
        if is_heading(line, 1) {
            return Some(idx);
        }
    }
    None
}

/// Apply `f` to every line; `Some` replaces the line. Keeps a trailing
/// newline if the input had one.
fn map_lines(body: &str, mut f: impl FnMut(&str) -> Option<String>) -> String {
    let mut out: Vec<String> = Vec::new();
    for line in body.lines() {
        out.push(f(line).unwrap_or_else(|| line.to_string()));
    }
    let mut joined = out.join("\n");
    if body.ends_with('\n') {
        joined.push('\n');
    }
    joined
}
