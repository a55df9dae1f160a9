//! PostgREST implementation of [`TicketStore`].
//!
//! `RestTicketStore` talks to the hosted `tickets` table through the
//! `/rest/v1/{table}` endpoint, retrying transient (5xx / timeout) failures
//! with exponential back-off and classifying permanent ones into
//! [`StoreError`] variants the lifecycle layer can act on.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use pm_domain::config::StoreConfig;
use pm_domain::ticket::{NewTicket, Ticket, TicketPatch, TicketRef};
use pm_domain::trace::TraceEvent;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

use crate::store::{StoreError, TicketStore};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

type Query = Vec<(&'static str, String)>;

/// A REST client for the ticket table. Created once per process.
#[derive(Debug, Clone)]
pub struct RestTicketStore {
    http: Client,
    table_url: String,
    api_key: String,
    max_retries: u32,
}

impl RestTicketStore {
    /// Build a client from [`StoreConfig`] and an already-resolved key.
    pub fn new(cfg: &StoreConfig, api_key: String) -> Result<Self, StoreError> {
        let base = cfg
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| StoreError::Upstream("store.base_url is not configured".into()))?;
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| StoreError::Upstream(e.to_string()))?;

        Ok(Self {
            http,
            table_url: table_url(base, &cfg.table),
            api_key,
            max_retries: cfg.max_retries,
        })
    }

    // ── request helpers ──────────────────────────────────────────────

    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        rb.header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Client-Info", "pm-agent")
            .header("X-Trace-Id", Uuid::new_v4().to_string())
    }

    // ── retry engine ─────────────────────────────────────────────────

    /// Execute a request with retry + exponential back-off.
    ///
    /// * Retries on 5xx status codes and on transport errors.
    /// * 4xx responses are permanent and are classified immediately.
    /// * Emits a `TraceEvent::StoreCall` after every attempt.
    async fn execute_with_retry(
        &self,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response, StoreError> {
        let mut last_err: Option<StoreError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }

            let start = Instant::now();
            let result = self.decorate(build_request()).send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    TraceEvent::StoreCall {
                        endpoint: endpoint.to_owned(),
                        status,
                        duration_ms,
                    }
                    .emit();

                    if resp.status().is_server_error() {
                        let body = resp.text().await.unwrap_or_default();
                        last_err = Some(StoreError::Upstream(format!(
                            "{endpoint} returned {status}: {body}"
                        )));
                        continue;
                    }
                    if resp.status().is_client_error() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(classify_error(status, &body));
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    TraceEvent::StoreCall {
                        endpoint: endpoint.to_owned(),
                        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                        duration_ms,
                    }
                    .emit();
                    last_err = Some(StoreError::Upstream(format!("{endpoint}: {e}")));
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| StoreError::Upstream(format!("{endpoint}: all retries exhausted"))))
    }

    async fn select<T: DeserializeOwned>(&self, query: Query) -> Result<Vec<T>, StoreError> {
        let resp = self
            .execute_with_retry("GET tickets", || self.http.get(&self.table_url).query(&query))
            .await?;
        parse_rows(resp).await
    }

    async fn max_of(&self, column: &'static str, mut query: Query) -> Result<Option<i64>, StoreError> {
        query.push(("select", column.to_string()));
        query.push(("order", format!("{column}.desc.nullslast")));
        query.push(("limit", "1".into()));
        let rows: Vec<serde_json::Value> = self.select(query).await?;
        Ok(rows
            .first()
            .and_then(|r| r.get(column))
            .and_then(|v| v.as_i64()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl TicketStore for RestTicketStore {
    async fn max_ticket_number(&self, repo: &str) -> Result<Option<i64>, StoreError> {
        self.max_of("ticket_number", vec![("repo_full_name", eq(repo))])
            .await
    }

    async fn max_legacy_id(&self) -> Result<Option<i64>, StoreError> {
        self.max_of("id", Vec::new()).await
    }

    async fn insert(&self, ticket: &NewTicket) -> Result<Ticket, StoreError> {
        let resp = self
            .execute_with_retry("POST tickets", || {
                self.http
                    .post(&self.table_url)
                    .header("Prefer", "return=representation")
                    .json(ticket)
            })
            .await?;
        let rows: Vec<Ticket> = parse_rows(resp).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Upstream("insert returned no row".into()))
    }

    async fn find(&self, r: &TicketRef) -> Result<Vec<Ticket>, StoreError> {
        match r {
            TicketRef::Pk(pk) => self.select(vec![("pk", eq(pk))]).await,
            TicketRef::DisplayId(d) => self.select(vec![("display_id", eq(d))]).await,
            TicketRef::Number(n) => {
                let scoped = self
                    .select::<Ticket>(vec![("or", format!("(ticket_number.eq.{n},id.eq.{n})"))])
                    .await;
                match scoped {
                    Ok(rows) => Ok(number_hits(rows, *n)),
                    Err(StoreError::MissingColumn(_)) => {
                        self.select(vec![("id", format!("eq.{n}"))]).await
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    async fn update(&self, pk: &str, patch: &TicketPatch) -> Result<Ticket, StoreError> {
        let query = vec![("pk", eq(pk))];
        let resp = self
            .execute_with_retry("PATCH tickets", || {
                self.http
                    .patch(&self.table_url)
                    .query(&query)
                    .header("Prefer", "return=representation")
                    .json(patch)
            })
            .await?;
        let rows: Vec<Ticket> = parse_rows(resp).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("ticket {pk}")))
    }

    async fn max_position(
        &self,
        column: &str,
        repo: Option<&str>,
    ) -> Result<Option<i64>, StoreError> {
        self.max_of("kanban_position", column_filter(column, repo))
            .await
    }

    async fn list_by_column(
        &self,
        column: &str,
        repo: Option<&str>,
    ) -> Result<Vec<Ticket>, StoreError> {
        let mut query = column_filter(column, repo);
        query.push(("order", "kanban_position.asc.nullslast".into()));
        self.select(query).await
    }

    async fn list_repos(&self) -> Result<Vec<String>, StoreError> {
        #[derive(Deserialize)]
        struct Row {
            repo_full_name: Option<String>,
        }
        let rows: Vec<Row> = self
            .select(vec![
                ("select", "repo_full_name".into()),
                ("repo_full_name", "not.is.null".into()),
            ])
            .await?;
        let mut repos: Vec<String> = rows.into_iter().filter_map(|r| r.repo_full_name).collect();
        repos.sort();
        repos.dedup();
        Ok(repos)
    }

    async fn count_in_repo(&self, repo: &str) -> Result<usize, StoreError> {
        let rows: Vec<serde_json::Value> = self
            .select(vec![("select", "pk".into()), ("repo_full_name", eq(repo))])
            .await?;
        Ok(rows.len())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// PostgREST error payload.
#[derive(Debug, Default, Deserialize)]
struct PgError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn table_url(base: &str, table: &str) -> String {
    format!("{}/rest/v1/{table}", base.trim_end_matches('/'))
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

fn column_filter(column: &str, repo: Option<&str>) -> Query {
    let mut q = vec![("kanban_column_id", eq(column))];
    if let Some(repo) = repo {
        q.push(("repo_full_name", eq(repo)));
    }
    q
}

/// The `or=` lookup also matches scoped rows whose legacy `id` happens to
/// equal `n`; keep only rows where `n` is the ticket's own number.
fn number_hits(rows: Vec<Ticket>, n: i64) -> Vec<Ticket> {
    rows.into_iter()
        .filter(|t| match t.ticket_number {
            Some(num) => num == n,
            None => t.id == Some(n),
        })
        .collect()
}

/// Map a 4xx response onto a [`StoreError`].
fn classify_error(status: u16, body: &str) -> StoreError {
    let pg: PgError = serde_json::from_str(body).unwrap_or_default();
    let code = pg.code.as_deref().unwrap_or_default();
    let message = pg.message.clone().unwrap_or_else(|| body.to_string());

    if status == 409 || code == "23505" {
        return StoreError::Conflict(message);
    }
    let lower = message.to_ascii_lowercase();
    if code == "42703"
        || code == "PGRST204"
        || (lower.contains("column") && (lower.contains("does not exist") || lower.contains("could not find")))
    {
        return StoreError::MissingColumn(message);
    }
    if status == 404 {
        return StoreError::NotFound(message);
    }
    StoreError::Upstream(format!("{status}: {message}"))
}

async fn parse_rows<T: DeserializeOwned>(resp: Response) -> Result<Vec<T>, StoreError> {
    let body = resp
        .text()
        .await
        .map_err(|e| StoreError::Upstream(e.to_string()))?;
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&body)
        .map_err(|e| StoreError::Upstream(format!("failed to parse store response: {e}: {body}")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
