//! Ticket lifecycle: creation with bounded number allocation, readiness
//! gating, and Kanban column moves within and across repositories.

use std::sync::Arc;

use chrono::Utc;
use pm_domain::ticket::{
    format_display_id, is_unassigned, is_valid_repo_full_name, NewTicket, Ticket, TicketPatch,
    TicketRef, COL_TODO,
};
use pm_domain::trace::TraceEvent;
use serde::Serialize;
use uuid::Uuid;

use crate::normalize::{
    acceptance_uses_plain_bullets, bullets_to_checkboxes, extract_title, normalize_headings,
    normalize_title_line, slugify,
};
use crate::prefix::repo_prefix;
use crate::readiness::{evaluate_ready, find_placeholders, ReadinessResult};
use crate::store::{StoreError, TicketStore};

/// Candidate numbers tried before allocation gives up.
pub const MAX_ID_ATTEMPTS: u32 = 10;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Errors and outcomes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    /// Rejected before any store mutation.
    #[error("{0}")]
    Validation(String),
    #[error("ticket {0} not found")]
    NotFound(String),
    #[error("ticket {display_id} is not in Unassigned (current column: {column})")]
    NotUnassigned { display_id: String, column: String },
    #[error("ticket {display_id} is not ready: {}", missing.join("; "))]
    NotReady {
        display_id: String,
        missing: Vec<String>,
    },
    #[error("could not allocate a unique ticket number after {attempts} attempts")]
    Exhausted { attempts: u32 },
    #[error(transparent)]
    Upstream(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutcome {
    #[serde(skip)]
    pub ticket: Ticket,
    pub ticket_id: String,
    pub display_id: String,
    pub ticket_number: i64,
    pub repo_full_name: Option<String>,
    pub filename: Option<String>,
    pub ready: bool,
    pub missing_items: Vec<String>,
    pub moved_to_todo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    /// Auto-move failure; the ticket itself was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_error: Option<String>,
    pub auto_fixed: bool,
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    #[serde(skip)]
    pub ticket: Ticket,
    pub ticket_id: String,
    pub display_id: String,
    pub from_column: Option<String>,
    pub to_column: String,
    pub repo_full_name: Option<String>,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    #[serde(skip)]
    pub ticket: Ticket,
    pub ticket_id: String,
    pub display_id: String,
    #[serde(flatten)]
    pub readiness: ReadinessResult,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Manager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Ticket operations scoped to one project repository.
///
/// With no repository configured, or on a store without scoped columns,
/// tickets are numbered from the legacy global sequence instead.
#[derive(Clone)]
pub struct TicketManager {
    store: Arc<dyn TicketStore>,
    repo: Option<String>,
}

impl TicketManager {
    pub fn new(store: Arc<dyn TicketStore>, repo: Option<String>) -> Self {
        Self { store, repo }
    }

    pub fn repo(&self) -> Option<&str> {
        self.repo.as_deref()
    }

    // ── creation ─────────────────────────────────────────────────────

    /// Create a ticket in Unassigned and, when it is ready, move it to the
    /// tail of To-do in the same call.
    pub async fn create(&self, title: &str, body_md: &str) -> Result<CreateOutcome, TicketError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TicketError::Validation("title must not be empty".into()));
        }
        let mut placeholders = find_placeholders(title);
        placeholders.extend(find_placeholders(body_md));
        if !placeholders.is_empty() {
            return Err(TicketError::Validation(format!(
                "ticket contains unresolved placeholders: {}",
                placeholders.join(", ")
            )));
        }

        let body = normalize_headings(body_md);
        let (scope, first) = self.next_number().await?;
        let (mut ticket, number, attempts) =
            self.insert_with_retry(scope.as_deref(), first, title, &body).await?;

        let leftover = find_placeholders(&ticket.body_md);
        if !leftover.is_empty() {
            tracing::warn!(display_id = %ticket.label(), ?leftover, "placeholders after normalisation");
        }

        let mut readiness = evaluate_ready(&ticket.body_md);
        let mut auto_fixed = false;
        if !readiness.ready && acceptance_uses_plain_bullets(&ticket.body_md) {
            let fixed = bullets_to_checkboxes(&ticket.body_md);
            let retry = evaluate_ready(&fixed);
            if retry.ready {
                let patch = TicketPatch {
                    body_md: Some(fixed),
                    ..TicketPatch::default()
                };
                match self.store.update(&ticket.pk, &patch).await {
                    Ok(updated) => {
                        ticket = updated;
                        readiness = retry;
                        auto_fixed = true;
                    }
                    Err(e) => tracing::warn!(error = %e, "acceptance checkbox auto-fix not saved"),
                }
            }
        }

        let mut moved_to_todo = false;
        let mut move_error = None;
        if readiness.ready {
            match self.place_in_todo(&ticket).await {
                Ok(moved) => {
                    ticket = moved;
                    moved_to_todo = true;
                }
                Err(e) => {
                    tracing::warn!(display_id = %ticket.label(), error = %e, "auto-move to To-do failed");
                    move_error = Some(e.to_string());
                }
            }
        }

        TraceEvent::TicketCreated {
            display_id: ticket.label(),
            repo_full_name: ticket.repo_full_name.clone(),
            ticket_number: number,
            attempts,
            ready: readiness.ready,
        }
        .emit();

        Ok(CreateOutcome {
            ticket_id: ticket.pk.clone(),
            display_id: ticket.label(),
            ticket_number: number,
            repo_full_name: ticket.repo_full_name.clone(),
            filename: ticket.filename.clone(),
            ready: readiness.ready,
            missing_items: readiness.missing_items,
            moved_to_todo,
            position: moved_to_todo.then_some(ticket.kanban_position).flatten(),
            move_error,
            auto_fixed,
            attempts,
            ticket,
        })
    }

    /// First candidate number and the scope it belongs to. `None` scope
    /// means legacy global numbering.
    async fn next_number(&self) -> Result<(Option<String>, i64), TicketError> {
        if let Some(repo) = &self.repo {
            match self.store.max_ticket_number(repo).await {
                Ok(max) => return Ok((Some(repo.clone()), max.unwrap_or(0) + 1)),
                Err(StoreError::MissingColumn(msg)) => {
                    tracing::warn!(reason = %msg, "store has no repository scoping; using legacy numbering");
                }
                Err(e) => return Err(e.into()),
            }
        }
        let max = self.store.max_legacy_id().await?;
        Ok((None, max.unwrap_or(0) + 1))
    }

    /// Insert with candidate numbers `first`, `first + 1`, ... until the
    /// store accepts one. Returns the row, its number and the attempt count.
    async fn insert_with_retry(
        &self,
        scope: Option<&str>,
        first: i64,
        title: &str,
        body: &str,
    ) -> Result<(Ticket, i64, u32), TicketError> {
        let slug = slugify(title);
        for attempt in 0..MAX_ID_ATTEMPTS {
            let number = first + i64::from(attempt);
            let row = new_row(scope, number, title, body, &slug);
            match self.store.insert(&row).await {
                Ok(ticket) => return Ok((ticket, number, attempt + 1)),
                Err(StoreError::Conflict(msg)) => {
                    TraceEvent::TicketIdConflict {
                        candidate: number,
                        attempt: attempt + 1,
                    }
                    .emit();
                    tracing::debug!(candidate = number, reason = %msg, "ticket number taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(TicketError::Exhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    // ── lookup and body edits ────────────────────────────────────────

    /// Resolve a display id, number or primary key to a stored ticket.
    pub async fn fetch(&self, raw_ref: &str) -> Result<Ticket, TicketError> {
        let r = TicketRef::parse(raw_ref).ok_or_else(|| {
            TicketError::Validation(format!(
                "invalid ticket id '{}': expected PREFIX-NNNN, a number, or a UUID",
                raw_ref.trim()
            ))
        })?;
        let rows = self.store.find(&r).await?;

        let picked = match (&r, self.repo.as_deref()) {
            // Bare numbers are only unique within one repository.
            (TicketRef::Number(_), Some(repo)) => rows
                .into_iter()
                .find(|t| t.repo_full_name.as_deref().map_or(true, |x| x == repo)),
            (_, Some(repo)) => {
                let (mine, other): (Vec<_>, Vec<_>) = rows
                    .into_iter()
                    .partition(|t| t.repo_full_name.as_deref() == Some(repo));
                mine.into_iter().chain(other).next()
            }
            (_, None) => rows.into_iter().next(),
        };
        picked.ok_or_else(|| TicketError::NotFound(r.to_string()))
    }

    /// Replace a ticket body, keeping headings and the title line
    /// canonical, and report the new readiness.
    pub async fn update_body(
        &self,
        raw_ref: &str,
        body_md: &str,
    ) -> Result<UpdateOutcome, TicketError> {
        let placeholders = find_placeholders(body_md);
        if !placeholders.is_empty() {
            return Err(TicketError::Validation(format!(
                "body contains unresolved placeholders: {}",
                placeholders.join(", ")
            )));
        }
        let ticket = self.fetch(raw_ref).await?;
        let label = ticket.label();

        let body = normalize_headings(body_md);
        let title = extract_title(&body)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| ticket.title.clone());
        let body = normalize_title_line(&body, &label, &title, true);

        let patch = TicketPatch {
            title: (title != ticket.title).then(|| title.clone()),
            body_md: Some(body),
            ..TicketPatch::default()
        };
        let updated = self.store.update(&ticket.pk, &patch).await?;
        let readiness = evaluate_ready(&updated.body_md);

        Ok(UpdateOutcome {
            ticket_id: updated.pk.clone(),
            display_id: updated.label(),
            readiness,
            ticket: updated,
        })
    }

    // ── column moves ─────────────────────────────────────────────────

    /// Move an Unassigned, ready ticket to the tail of its repository's
    /// To-do column.
    pub async fn move_to_todo(&self, raw_ref: &str) -> Result<MoveOutcome, TicketError> {
        let ticket = self.fetch(raw_ref).await?;
        let from = ticket.kanban_column_id.clone();
        if !is_unassigned(from.as_deref()) {
            return Err(TicketError::NotUnassigned {
                display_id: ticket.label(),
                column: from.unwrap_or_default(),
            });
        }
        let readiness = evaluate_ready(&ticket.body_md);
        if !readiness.ready {
            return Err(TicketError::NotReady {
                display_id: ticket.label(),
                missing: readiness.missing_items,
            });
        }

        let moved = self.place_in_todo(&ticket).await?;
        Ok(move_outcome(from, moved))
    }

    /// Move a ticket from any column to another repository's To-do,
    /// renumbering it in the target scope.
    pub async fn move_to_other_repo_todo(
        &self,
        raw_ref: &str,
        target_repo: &str,
    ) -> Result<MoveOutcome, TicketError> {
        let target = target_repo.trim();
        if !is_valid_repo_full_name(target) {
            return Err(TicketError::Validation(format!(
                "invalid target repository '{target}': expected owner/name"
            )));
        }
        let ticket = self.fetch(raw_ref).await?;
        let from = ticket.kanban_column_id.clone();

        // A repository with no tickets yet is a valid target; only a failed
        // query is an error.
        let existing = self.store.count_in_repo(target).await?;
        tracing::debug!(target_repo = %target, existing, "cross-repo move target checked");

        let first = match self.store.max_ticket_number(target).await? {
            Some(max) => max + 1,
            None => ticket.ticket_number.or(ticket.id).unwrap_or(1),
        };
        let position = self.todo_tail(Some(target)).await?;
        let prefix = repo_prefix(target);
        let title = extract_title(&ticket.body_md).unwrap_or_else(|| ticket.title.clone());

        for attempt in 0..MAX_ID_ATTEMPTS {
            let number = first + i64::from(attempt);
            let label = format_display_id(&prefix, number);
            let patch = TicketPatch {
                repo_full_name: Some(target.to_string()),
                ticket_number: Some(number),
                display_id: Some(label.clone()),
                body_md: Some(normalize_title_line(&ticket.body_md, &label, &title, true)),
                kanban_column_id: Some(COL_TODO.to_string()),
                kanban_position: Some(position),
                kanban_moved_at: Some(Utc::now()),
                ..TicketPatch::default()
            };
            match self.store.update(&ticket.pk, &patch).await {
                Ok(moved) => {
                    emit_moved(&from, &moved, position);
                    return Ok(move_outcome(from, moved));
                }
                Err(StoreError::Conflict(msg)) => {
                    TraceEvent::TicketIdConflict {
                        candidate: number,
                        attempt: attempt + 1,
                    }
                    .emit();
                    tracing::debug!(candidate = number, reason = %msg, "target number taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(TicketError::Exhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    /// Write column, tail position and timestamp for a To-do move.
    async fn place_in_todo(&self, ticket: &Ticket) -> Result<Ticket, TicketError> {
        let position = self.todo_tail(ticket.repo_full_name.as_deref()).await?;
        let patch = TicketPatch {
            kanban_column_id: Some(COL_TODO.to_string()),
            kanban_position: Some(position),
            kanban_moved_at: Some(Utc::now()),
            ..TicketPatch::default()
        };
        let moved = self.store.update(&ticket.pk, &patch).await?;
        emit_moved(&ticket.kanban_column_id, &moved, position);
        Ok(moved)
    }

    /// One past the highest To-do position, 0 for an empty column.
    async fn todo_tail(&self, repo: Option<&str>) -> Result<i64, TicketError> {
        let max = match self.store.max_position(COL_TODO, repo).await {
            Err(StoreError::MissingColumn(_)) if repo.is_some() => {
                self.store.max_position(COL_TODO, None).await?
            }
            other => other?,
        };
        Ok(max.map_or(0, |m| m + 1))
    }

    // ── listings ─────────────────────────────────────────────────────

    pub async fn list_by_column(&self, column_id: &str) -> Result<Vec<Ticket>, TicketError> {
        let column = column_id.trim();
        if column.is_empty() {
            return Err(TicketError::Validation("column_id must not be empty".into()));
        }
        match self.store.list_by_column(column, self.repo.as_deref()).await {
            Err(StoreError::MissingColumn(_)) if self.repo.is_some() => {
                Ok(self.store.list_by_column(column, None).await?)
            }
            other => Ok(other?),
        }
    }

    /// Repositories known to the store plus the configured one, sorted.
    pub async fn list_repos(&self) -> Result<Vec<String>, TicketError> {
        let mut repos = match self.store.list_repos().await {
            Ok(r) => r,
            Err(StoreError::MissingColumn(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        if let Some(repo) = &self.repo {
            repos.push(repo.clone());
        }
        repos.sort();
        repos.dedup();
        Ok(repos)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Insert payload for candidate `number`. Scoped rows carry repo, number
/// and display id; legacy rows only the global `id`.
fn new_row(scope: Option<&str>, number: i64, title: &str, body: &str, slug: &str) -> NewTicket {
    let label = match scope {
        Some(repo) => format_display_id(&repo_prefix(repo), number),
        None => format!("{number:04}"),
    };
    let (id, display_id, repo_full_name, ticket_number) = match scope {
        Some(repo) => (None, Some(label.clone()), Some(repo.to_string()), Some(number)),
        None => (Some(number), None, None, None),
    };
    NewTicket {
        pk: Uuid::new_v4().to_string(),
        id,
        display_id,
        repo_full_name,
        ticket_number,
        title: title.to_string(),
        body_md: normalize_title_line(body, &label, title, true),
        filename: format!("{label}-{slug}.md"),
        kanban_column_id: pm_domain::ticket::COL_UNASSIGNED.to_string(),
        kanban_position: 0,
        kanban_moved_at: Utc::now(),
    }
}

fn emit_moved(from: &Option<String>, moved: &Ticket, position: i64) {
    TraceEvent::TicketMoved {
        display_id: moved.label(),
        from_column: from.clone(),
        to_column: COL_TODO.to_string(),
        to_repo: moved.repo_full_name.clone(),
        position,
    }
    .emit();
}

fn move_outcome(from: Option<String>, moved: Ticket) -> MoveOutcome {
    MoveOutcome {
        ticket_id: moved.pk.clone(),
        display_id: moved.label(),
        from_column: from,
        to_column: moved.kanban_column_id.clone().unwrap_or_default(),
        repo_full_name: moved.repo_full_name.clone(),
        position: moved.kanban_position.unwrap_or_default(),
        ticket: moved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_row_carries_display_id_and_title_line() {
        let row = new_row(Some("acme/hal-portal"), 7, "Fix login", "## Goal\nx\n", "fix-login");
        assert_eq!(row.display_id.as_deref(), Some("PORTAL-0007"));
        assert_eq!(row.ticket_number, Some(7));
        assert_eq!(row.id, None);
        assert_eq!(row.filename, "PORTAL-0007-fix-login.md");
        assert!(row.body_md.starts_with("# PORTAL-0007 — Fix login\n"));
        assert_eq!(row.kanban_position, 0);
    }

    #[test]
    fn legacy_row_uses_global_id() {
        let row = new_row(None, 7, "Fix login", "## Goal\nx\n", "fix-login");
        assert_eq!(row.id, Some(7));
        assert!(row.display_id.is_none() && row.repo_full_name.is_none());
        assert_eq!(row.filename, "0007-fix-login.md");
    }

    #[test]
    fn error_messages_name_the_problem() {
        assert_eq!(TicketError::NotFound("0099".into()).to_string(), "ticket 0099 not found");
        let e = TicketError::NotUnassigned {
            display_id: "HAL-0001".into(),
            column: "col-qa".into(),
        };
        assert!(e.to_string().contains("not in Unassigned"));
    }
}
