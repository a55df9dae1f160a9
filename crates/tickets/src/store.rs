use async_trait::async_trait;
use pm_domain::ticket::{NewTicket, Ticket, TicketPatch, TicketRef};

/// Classified store failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("uniqueness conflict: {0}")]
    Conflict(String),
    /// The store predates repository-scoped columns.
    #[error("column does not exist: {0}")]
    MissingColumn(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Upstream(String),
}

/// The `tickets` table.
///
/// Scoped operations (`repo` arguments, `max_ticket_number`,
/// `count_in_repo`) return [`StoreError::MissingColumn`] on stores without
/// repository scoping; callers fall back to the legacy global numbering.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Highest `ticket_number` within `repo`, `None` when it has no tickets.
    async fn max_ticket_number(&self, repo: &str) -> Result<Option<i64>, StoreError>;

    /// Highest legacy global `id`.
    async fn max_legacy_id(&self) -> Result<Option<i64>, StoreError>;

    /// Insert a row. Duplicate numbers or filenames yield `Conflict`.
    async fn insert(&self, ticket: &NewTicket) -> Result<Ticket, StoreError>;

    /// Every row matching the reference. A `Number` matches the scoped
    /// `ticket_number` or, for rows without one, the legacy `id`.
    async fn find(&self, r: &TicketRef) -> Result<Vec<Ticket>, StoreError>;

    /// Apply `patch` to the row with primary key `pk` and return it.
    async fn update(&self, pk: &str, patch: &TicketPatch) -> Result<Ticket, StoreError>;

    /// Highest `kanban_position` in `column`, optionally within `repo`.
    async fn max_position(&self, column: &str, repo: Option<&str>)
        -> Result<Option<i64>, StoreError>;

    /// Rows in `column` ordered by position, optionally within `repo`.
    async fn list_by_column(&self, column: &str, repo: Option<&str>)
        -> Result<Vec<Ticket>, StoreError>;

    /// Distinct repository scopes present in the table.
    async fn list_repos(&self) -> Result<Vec<String>, StoreError>;

    /// Number of rows in `repo`. Zero is a valid answer.
    async fn count_in_repo(&self, repo: &str) -> Result<usize, StoreError>;
}
