//! `pm-agent ready`: Definition-of-Ready report for a local markdown file.

use pm_tickets::normalize::normalize_headings;
use pm_tickets::{evaluate_ready, ReadinessResult};

/// Evaluate a ticket body the way ticket creation would (legacy headings
/// normalised first).
pub fn evaluate_file(path: &str) -> anyhow::Result<ReadinessResult> {
    let body = std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("reading {path}: {e}"))?;
    Ok(evaluate_ready(&normalize_headings(&body)))
}

/// Print the report. Returns whether the body is ready.
pub fn ready(path: &str, json_output: bool) -> anyhow::Result<bool> {
    let result = evaluate_file(path)?;

    if json_output {
        let json = serde_json::to_string_pretty(&result)
            .map_err(|e| anyhow::anyhow!("serializing readiness: {e}"))?;
        println!("{json}");
        return Ok(result.ready);
    }

    if result.ready {
        println!("READY  {path}");
    } else {
        println!("NOT READY  {path}");
        for item in &result.missing_items {
            println!("  - {item}");
        }
    }
    Ok(result.ready)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_headings_count_as_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ticket.md");
        std::fs::write(
            &path,
            "# Goal\nShip it.\n\n# Human-verifiable deliverable\nA page.\n\n\
             # Acceptance criteria\n- [ ] Loads\n\n# Constraints\nNone.\n\n# Non-goals\nNone.\n",
        )
        .unwrap();

        let result = evaluate_file(path.to_str().unwrap()).unwrap();
        assert!(result.ready, "missing: {:?}", result.missing_items);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(evaluate_file("/nonexistent/ticket.md").is_err());
    }
}
