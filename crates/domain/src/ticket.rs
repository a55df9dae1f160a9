use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Kanban columns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const COL_UNASSIGNED: &str = "col-unassigned";
pub const COL_TODO: &str = "col-todo";

/// A null or empty column id counts as Unassigned.
pub fn is_unassigned(column: Option<&str>) -> bool {
    match column.map(str::trim) {
        None | Some("") => true,
        Some(c) => c == COL_UNASSIGNED,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ticket rows
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One row of the `tickets` table.
///
/// Scoped columns (`display_id`, `repo_full_name`, `ticket_number`) are
/// optional because legacy stores do not have them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub pk: String,
    /// Legacy global sequence number.
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub display_id: Option<String>,
    #[serde(default)]
    pub repo_full_name: Option<String>,
    #[serde(default)]
    pub ticket_number: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub body_md: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub kanban_column_id: Option<String>,
    #[serde(default)]
    pub kanban_position: Option<i64>,
    #[serde(default)]
    pub kanban_moved_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Display id when present, otherwise the zero-padded legacy number.
    pub fn label(&self) -> String {
        if let Some(d) = self.display_id.as_deref().filter(|d| !d.is_empty()) {
            return d.to_string();
        }
        match self.ticket_number.or(self.id) {
            Some(n) => format!("{n:04}"),
            None => self.pk.clone(),
        }
    }
}

/// Insert payload. `id` is set in legacy mode, the scoped fields otherwise.
#[derive(Debug, Clone, Serialize)]
pub struct NewTicket {
    pub pk: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<i64>,
    pub title: String,
    pub body_md: String,
    pub filename: String,
    pub kanban_column_id: String,
    pub kanban_position: i64,
    pub kanban_moved_at: DateTime<Utc>,
}

/// Partial update; only `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TicketPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_md: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kanban_column_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kanban_position: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kanban_moved_at: Option<DateTime<Utc>>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ticket references
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("static regex")
});

static DISPLAY_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]{1,6})-(\d{1,9})$").expect("static regex"));

/// How the model referred to a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketRef {
    Pk(String),
    /// Upper-cased `PREFIX-NNNN`.
    DisplayId(String),
    Number(i64),
}

impl TicketRef {
    /// Accepts `HAL-0012`, `12`, `0012` or a UUID primary key.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if UUID_RE.is_match(raw) {
            return Some(Self::Pk(raw.to_ascii_lowercase()));
        }
        if let Some(caps) = DISPLAY_ID_RE.captures(raw) {
            let n: i64 = caps[2].parse().ok()?;
            return Some(Self::DisplayId(format_display_id(&caps[1], n)));
        }
        if !raw.is_empty() && raw.len() <= 9 && raw.bytes().all(|b| b.is_ascii_digit()) {
            return raw.parse().ok().map(Self::Number);
        }
        None
    }
}

impl fmt::Display for TicketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pk(pk) => f.write_str(pk),
            Self::DisplayId(d) => f.write_str(d),
            Self::Number(n) => write!(f, "{n:04}"),
        }
    }
}

pub fn format_display_id(prefix: &str, number: i64) -> String {
    format!("{}-{number:04}", prefix.to_ascii_uppercase())
}

/// `owner/name`, each side non-empty, no whitespace, exactly one slash.
pub fn is_valid_repo_full_name(repo: &str) -> bool {
    let mut parts = repo.split('/');
    let (Some(owner), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    let ok = |s: &str| {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };
    ok(owner) && ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_display_ids_numbers_and_uuids() {
        assert_eq!(
            TicketRef::parse("hal-12"),
            Some(TicketRef::DisplayId("HAL-0012".into()))
        );
        assert_eq!(TicketRef::parse("0099"), Some(TicketRef::Number(99)));
        assert_eq!(TicketRef::parse(" 7 "), Some(TicketRef::Number(7)));
        let pk = "6F9619FF-8B86-D011-B42D-00C04FC964FF";
        assert_eq!(TicketRef::parse(pk), Some(TicketRef::Pk(pk.to_ascii_lowercase())));
    }

    #[test]
    fn rejects_malformed_refs() {
        assert_eq!(TicketRef::parse(""), None);
        assert_eq!(TicketRef::parse("ticket twelve"), None);
        assert_eq!(TicketRef::parse("ABCDEFG-1"), None);
        assert_eq!(TicketRef::parse("-3"), None);
    }

    #[test]
    fn null_and_empty_columns_are_unassigned() {
        assert!(is_unassigned(None));
        assert!(is_unassigned(Some("")));
        assert!(is_unassigned(Some(COL_UNASSIGNED)));
        assert!(!is_unassigned(Some("col-qa")));
    }

    #[test]
    fn repo_full_name_needs_owner_and_name() {
        assert!(is_valid_repo_full_name("acme/hal-portal"));
        assert!(!is_valid_repo_full_name("hal-portal"));
        assert!(!is_valid_repo_full_name("acme/"));
        assert!(!is_valid_repo_full_name("a/b/c"));
        assert!(!is_valid_repo_full_name("acme/hal portal"));
    }

    #[test]
    fn label_prefers_display_id() {
        let mut t = Ticket {
            pk: "pk".into(),
            id: Some(3),
            display_id: None,
            repo_full_name: None,
            ticket_number: None,
            title: "t".into(),
            body_md: String::new(),
            filename: None,
            kanban_column_id: None,
            kanban_position: None,
            kanban_moved_at: None,
        };
        assert_eq!(t.label(), "0003");
        t.display_id = Some("HAL-0003".into());
        assert_eq!(t.label(), "HAL-0003");
    }
}
