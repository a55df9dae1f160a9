//! In-process [`TicketStore`] with the same uniqueness rules as the
//! hosted table, plus fault injection for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use pm_domain::ticket::{NewTicket, Ticket, TicketPatch, TicketRef};

use crate::store::{StoreError, TicketStore};

#[derive(Default)]
struct Inner {
    rows: Vec<Ticket>,
    /// Reject scoped columns like a pre-migration table.
    legacy: bool,
    /// Remaining inserts to fail with `Conflict`.
    forced_conflicts: u32,
    /// Remaining updates to fail with `Upstream`.
    forced_update_failures: u32,
    /// Sequence number of every insert attempt, in order.
    insert_attempts: Vec<i64>,
}

#[derive(Default)]
pub struct MemoryTicketStore {
    inner: Mutex<Inner>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store without repository-scoped columns.
    pub fn legacy() -> Self {
        let store = Self::default();
        store.inner.lock().legacy = true;
        store
    }

    /// Fail the next `n` inserts with a uniqueness conflict.
    pub fn inject_conflicts(&self, n: u32) {
        self.inner.lock().forced_conflicts = n;
    }

    /// Fail the next `n` updates with an upstream error.
    pub fn inject_update_failures(&self, n: u32) {
        self.inner.lock().forced_update_failures = n;
    }

    /// Sequence numbers tried by `insert`, including rejected attempts.
    pub fn insert_attempts(&self) -> Vec<i64> {
        self.inner.lock().insert_attempts.clone()
    }

    /// Put a row in place as-is.
    pub fn seed(&self, ticket: Ticket) {
        self.inner.lock().rows.push(ticket);
    }

    pub fn get(&self, pk: &str) -> Option<Ticket> {
        self.inner.lock().rows.iter().find(|t| t.pk == pk).cloned()
    }

    pub fn all(&self) -> Vec<Ticket> {
        self.inner.lock().rows.clone()
    }
}

fn missing_scope(column: &str) -> StoreError {
    StoreError::MissingColumn(format!("column tickets.{column} does not exist"))
}

fn in_repo(t: &Ticket, repo: Option<&str>) -> bool {
    repo.map_or(true, |r| t.repo_full_name.as_deref() == Some(r))
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn max_ticket_number(&self, repo: &str) -> Result<Option<i64>, StoreError> {
        let inner = self.inner.lock();
        if inner.legacy {
            return Err(missing_scope("ticket_number"));
        }
        Ok(inner
            .rows
            .iter()
            .filter(|t| t.repo_full_name.as_deref() == Some(repo))
            .filter_map(|t| t.ticket_number)
            .max())
    }

    async fn max_legacy_id(&self) -> Result<Option<i64>, StoreError> {
        Ok(self.inner.lock().rows.iter().filter_map(|t| t.id).max())
    }

    async fn insert(&self, new: &NewTicket) -> Result<Ticket, StoreError> {
        let mut inner = self.inner.lock();
        let scoped = new.repo_full_name.is_some()
            || new.ticket_number.is_some()
            || new.display_id.is_some();
        if inner.legacy && scoped {
            return Err(missing_scope("repo_full_name"));
        }
        inner
            .insert_attempts
            .push(new.ticket_number.or(new.id).unwrap_or_default());

        if inner.forced_conflicts > 0 {
            inner.forced_conflicts -= 1;
            return Err(StoreError::Conflict(
                "duplicate key value violates unique constraint (injected)".into(),
            ));
        }

        for row in &inner.rows {
            let same_repo = row.repo_full_name == new.repo_full_name;
            if same_repo && new.ticket_number.is_some() && row.ticket_number == new.ticket_number {
                return Err(StoreError::Conflict(format!(
                    "ticket_number {} already exists",
                    new.ticket_number.unwrap_or_default()
                )));
            }
            if new.id.is_some() && row.id == new.id {
                return Err(StoreError::Conflict(format!(
                    "id {} already exists",
                    new.id.unwrap_or_default()
                )));
            }
            if same_repo && row.filename.as_deref() == Some(new.filename.as_str()) {
                return Err(StoreError::Conflict(format!(
                    "filename {} already exists",
                    new.filename
                )));
            }
            if row.pk == new.pk {
                return Err(StoreError::Conflict(format!("pk {} already exists", new.pk)));
            }
        }

        let row = Ticket {
            pk: new.pk.clone(),
            id: new.id,
            display_id: new.display_id.clone(),
            repo_full_name: new.repo_full_name.clone(),
            ticket_number: new.ticket_number,
            title: new.title.clone(),
            body_md: new.body_md.clone(),
            filename: Some(new.filename.clone()),
            kanban_column_id: Some(new.kanban_column_id.clone()),
            kanban_position: Some(new.kanban_position),
            kanban_moved_at: Some(new.kanban_moved_at),
        };
        inner.rows.push(row.clone());
        Ok(row)
    }

    async fn find(&self, r: &TicketRef) -> Result<Vec<Ticket>, StoreError> {
        let inner = self.inner.lock();
        let hits = inner.rows.iter().filter(|t| match r {
            TicketRef::Pk(pk) => t.pk.eq_ignore_ascii_case(pk),
            TicketRef::DisplayId(d) => t
                .display_id
                .as_deref()
                .is_some_and(|x| x.eq_ignore_ascii_case(d)),
            TicketRef::Number(n) => match t.ticket_number {
                Some(num) => num == *n,
                None => t.id == Some(*n),
            },
        });
        Ok(hits.cloned().collect())
    }

    async fn update(&self, pk: &str, patch: &TicketPatch) -> Result<Ticket, StoreError> {
        let mut inner = self.inner.lock();
        if inner.legacy
            && (patch.repo_full_name.is_some()
                || patch.ticket_number.is_some()
                || patch.display_id.is_some())
        {
            return Err(missing_scope("repo_full_name"));
        }
        if inner.forced_update_failures > 0 {
            inner.forced_update_failures -= 1;
            return Err(StoreError::Upstream("update failed (injected)".into()));
        }

        // Scoped uniqueness for repo/number changes.
        if let Some(num) = patch.ticket_number {
            let current = inner.rows.iter().find(|t| t.pk == pk).cloned();
            let target_repo = patch
                .repo_full_name
                .clone()
                .or_else(|| current.and_then(|c| c.repo_full_name));
            let clash = inner.rows.iter().any(|t| {
                t.pk != pk && t.repo_full_name == target_repo && t.ticket_number == Some(num)
            });
            if clash {
                return Err(StoreError::Conflict(format!("ticket_number {num} already exists")));
            }
        }

        let row = inner
            .rows
            .iter_mut()
            .find(|t| t.pk == pk)
            .ok_or_else(|| StoreError::NotFound(format!("ticket {pk}")))?;

        if let Some(v) = &patch.display_id {
            row.display_id = Some(v.clone());
        }
        if let Some(v) = &patch.repo_full_name {
            row.repo_full_name = Some(v.clone());
        }
        if let Some(v) = patch.ticket_number {
            row.ticket_number = Some(v);
        }
        if let Some(v) = &patch.title {
            row.title = v.clone();
        }
        if let Some(v) = &patch.body_md {
            row.body_md = v.clone();
        }
        if let Some(v) = &patch.kanban_column_id {
            row.kanban_column_id = Some(v.clone());
        }
        if let Some(v) = patch.kanban_position {
            row.kanban_position = Some(v);
        }
        if let Some(v) = patch.kanban_moved_at {
            row.kanban_moved_at = Some(v);
        }
        Ok(row.clone())
    }

    async fn max_position(
        &self,
        column: &str,
        repo: Option<&str>,
    ) -> Result<Option<i64>, StoreError> {
        let inner = self.inner.lock();
        if inner.legacy && repo.is_some() {
            return Err(missing_scope("repo_full_name"));
        }
        Ok(inner
            .rows
            .iter()
            .filter(|t| t.kanban_column_id.as_deref() == Some(column) && in_repo(t, repo))
            .filter_map(|t| t.kanban_position)
            .max())
    }

    async fn list_by_column(
        &self,
        column: &str,
        repo: Option<&str>,
    ) -> Result<Vec<Ticket>, StoreError> {
        let inner = self.inner.lock();
        if inner.legacy && repo.is_some() {
            return Err(missing_scope("repo_full_name"));
        }
        let mut rows: Vec<Ticket> = inner
            .rows
            .iter()
            .filter(|t| t.kanban_column_id.as_deref() == Some(column) && in_repo(t, repo))
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.kanban_position.unwrap_or(i64::MAX));
        Ok(rows)
    }

    async fn list_repos(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock();
        if inner.legacy {
            return Err(missing_scope("repo_full_name"));
        }
        let mut repos: Vec<String> = inner
            .rows
            .iter()
            .filter_map(|t| t.repo_full_name.clone())
            .collect();
        repos.sort();
        repos.dedup();
        Ok(repos)
    }

    async fn count_in_repo(&self, repo: &str) -> Result<usize, StoreError> {
        let inner = self.inner.lock();
        if inner.legacy {
            return Err(missing_scope("repo_full_name"));
        }
        Ok(inner
            .rows
            .iter()
            .filter(|t| t.repo_full_name.as_deref() == Some(repo))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn new_ticket(repo: &str, n: i64, filename: &str) -> NewTicket {
        NewTicket {
            pk: uuid::Uuid::new_v4().to_string(),
            id: None,
            display_id: Some(format!("HAL-{n:04}")),
            repo_full_name: Some(repo.into()),
            ticket_number: Some(n),
            title: "t".into(),
            body_md: String::new(),
            filename: filename.into(),
            kanban_column_id: "col-unassigned".into(),
            kanban_position: 0,
            kanban_moved_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn numbers_are_unique_per_repo() {
        let store = MemoryTicketStore::new();
        store.insert(&new_ticket("acme/hal", 1, "a.md")).await.unwrap();
        let err = store.insert(&new_ticket("acme/hal", 1, "b.md")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        store.insert(&new_ticket("acme/web", 1, "a.md")).await.unwrap();
        assert_eq!(store.max_ticket_number("acme/hal").await.unwrap(), Some(1));
        assert_eq!(store.count_in_repo("acme/web").await.unwrap(), 1);
        assert_eq!(store.count_in_repo("acme/none").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn injected_conflicts_are_consumed() {
        let store = MemoryTicketStore::new();
        store.inject_conflicts(1);
        assert!(store.insert(&new_ticket("acme/hal", 1, "a.md")).await.is_err());
        store.insert(&new_ticket("acme/hal", 2, "a.md")).await.unwrap();
        assert_eq!(store.insert_attempts(), vec![1, 2]);
    }

    #[tokio::test]
    async fn legacy_store_rejects_scoped_columns() {
        let store = MemoryTicketStore::legacy();
        let err = store.insert(&new_ticket("acme/hal", 1, "a.md")).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingColumn(_)));
        assert!(store.list_repos().await.is_err());
        assert!(store.max_position("col-todo", None).await.is_ok());
    }

    #[tokio::test]
    async fn number_lookup_falls_back_to_legacy_id() {
        let store = MemoryTicketStore::legacy();
        let mut t = new_ticket("x/y", 0, "a.md");
        t.display_id = None;
        t.repo_full_name = None;
        t.ticket_number = None;
        t.id = Some(7);
        store.insert(&t).await.unwrap();
        let hits = store.find(&TicketRef::Number(7)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].label(), "0007");
    }

    #[tokio::test]
    async fn list_by_column_orders_by_position() {
        let store = MemoryTicketStore::new();
        for (n, pos) in [(1, 2), (2, 0), (3, 1)] {
            let mut t = new_ticket("acme/hal", n, &format!("{n}.md"));
            t.kanban_column_id = "col-todo".into();
            t.kanban_position = pos;
            store.insert(&t).await.unwrap();
        }
        let rows = store.list_by_column("col-todo", Some("acme/hal")).await.unwrap();
        let numbers: Vec<_> = rows.iter().filter_map(|t| t.ticket_number).collect();
        assert_eq!(numbers, vec![2, 3, 1]);
    }
}
