//! Line capping and regex scanning shared by the local and GitHub tools.

use regex::Regex;
use serde::Serialize;

/// One `search_files` hit. `line` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    pub path: String,
    pub line: usize,
    pub text: String,
}

/// Keep the first `max_lines` lines; append an omission marker when cut.
/// Returns the text and the number of omitted lines.
pub fn cap_lines(content: &str, max_lines: usize) -> (String, usize) {
    let total = content.lines().count();
    if total <= max_lines {
        return (content.to_string(), 0);
    }
    let omitted = total - max_lines;
    let mut out = content.lines().take(max_lines).collect::<Vec<_>>().join("\n");
    out.push_str(&format!("\n\n... ({omitted} more lines omitted)"));
    (out, omitted)
}

/// Trim and cap a matched line at `max_chars` characters.
pub fn clip_line(line: &str, max_chars: usize) -> String {
    let trimmed = line.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => trimmed[..idx].to_string(),
        None => trimmed.to_string(),
    }
}

/// Append matches of `re` in `content` until `matches` holds `max` items.
/// Returns `true` once the cap is reached.
pub fn scan_content(
    path: &str,
    content: &str,
    re: &Regex,
    max: usize,
    max_chars: usize,
    matches: &mut Vec<SearchMatch>,
) -> bool {
    for (idx, line) in content.lines().enumerate() {
        if matches.len() >= max {
            return true;
        }
        if re.is_match(line) {
            matches.push(SearchMatch {
                path: path.to_string(),
                line: idx + 1,
                text: clip_line(line, max_chars),
            });
        }
    }
    matches.len() >= max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_lines_marks_omitted_count() {
        let content = (1..=10).map(|i| format!("l{i}")).collect::<Vec<_>>().join("\n");
        let (out, omitted) = cap_lines(&content, 3);
        assert_eq!(omitted, 7);
        assert!(out.starts_with("l1\nl2\nl3\n\n"));
        assert!(out.ends_with("(7 more lines omitted)"));
    }

    #[test]
    fn cap_lines_leaves_short_files() {
        assert_eq!(cap_lines("a\nb", 500), ("a\nb".to_string(), 0));
    }

    #[test]
    fn clip_line_counts_chars_not_bytes() {
        let line = format!("   {}   ", "é".repeat(300));
        let clipped = clip_line(&line, 200);
        assert_eq!(clipped.chars().count(), 200);
    }

    #[test]
    fn scan_reports_one_based_lines_and_stops_at_cap() {
        let re = Regex::new("TODO").unwrap();
        let mut matches = Vec::new();
        let full = scan_content("a.md", "x\nTODO one\ny\nTODO two\n", &re, 1, 200, &mut matches);
        assert!(full);
        assert_eq!(matches, vec![SearchMatch { path: "a.md".into(), line: 2, text: "TODO one".into() }]);
    }
}
