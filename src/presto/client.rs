//! Presto driver over the client REST protocol

use super::protocol::{
    QueryResults, StatementStats, HEADER_CATALOG, HEADER_PREPARED_STATEMENT, HEADER_SCHEMA,
    HEADER_SOURCE, HEADER_USER,
};
use crate::client::ConnectionParams;
use crate::config::DEFAULT_SOURCE;
use crate::connection::{
    not_executed, Column, Engine, HttpSession, RawConnection, RawCursor, Row, SessionSettings,
};
use crate::{Error, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Rows returned by `fetch_many(None)`
pub const DEFAULT_ARRAY_SIZE: usize = 1;

const UNAVAILABLE_ATTEMPTS: u32 = 3;
const UNAVAILABLE_BACKOFF: Duration = Duration::from_millis(100);
const ERROR_BODY_PREVIEW: usize = 512;

// Names for prepared statements created by parameterised executes
static PREPARED_STATEMENT_COUNT: AtomicU64 = AtomicU64::new(0);

/// Opens [`PrestoConnection`]s
#[derive(Debug, Clone)]
pub struct PrestoEngine {
    settings: SessionSettings,
    source: String,
}

impl PrestoEngine {
    /// Engine whose connections use `settings` and identify as `source`
    pub fn new(settings: SessionSettings, source: impl Into<String>) -> Self {
        Self {
            settings,
            source: source.into(),
        }
    }
}

impl Default for PrestoEngine {
    fn default() -> Self {
        Self::new(SessionSettings::default(), DEFAULT_SOURCE)
    }
}

impl Engine for PrestoEngine {
    type Connection = PrestoConnection;

    async fn connect(&self, params: &ConnectionParams) -> Result<PrestoConnection> {
        // The protocol is stateless; nothing is sent until the first execute.
        let session = HttpSession::new(self.settings.clone())?;
        Ok(PrestoConnection::new(params.clone(), session, self.source.clone()))
    }
}

/// Connection to a Presto coordinator
#[derive(Debug)]
pub struct PrestoConnection {
    params: Arc<ConnectionParams>,
    session: Arc<HttpSession>,
    source: Arc<str>,
    closed: Arc<AtomicBool>,
    array_size: usize,
}

impl PrestoConnection {
    /// Create a connection over an existing session
    pub fn new(params: ConnectionParams, session: HttpSession, source: impl Into<Arc<str>>) -> Self {
        Self {
            params: Arc::new(params),
            session: Arc::new(session),
            source: source.into(),
            closed: Arc::new(AtomicBool::new(false)),
            array_size: DEFAULT_ARRAY_SIZE,
        }
    }

    /// Parameters this connection sends with every request
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Set the default fetch size of cursors created afterwards
    pub fn set_array_size(&mut self, array_size: usize) {
        self.array_size = array_size.max(1);
    }

    /// Whether [`close`](RawConnection::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl RawConnection for PrestoConnection {
    type Cursor = PrestoCursor;

    fn cursor(&self) -> Result<PrestoCursor> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        Ok(PrestoCursor {
            params: Arc::clone(&self.params),
            session: Arc::clone(&self.session),
            source: Arc::clone(&self.source),
            closed: Arc::clone(&self.closed),
            array_size: self.array_size,
            query: None,
        })
    }

    fn session(&self) -> &HttpSession {
        &self.session
    }

    fn session_mut(&mut self) -> &mut HttpSession {
        Arc::make_mut(&mut self.session)
    }

    fn install_session(&mut self, session: HttpSession) {
        self.session = Arc::new(session);
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct QueryState {
    id: String,
    info_uri: Option<String>,
    next_uri: Option<String>,
    columns: Option<Vec<Column>>,
    buffer: VecDeque<Row>,
    stats: StatementStats,
    update_type: Option<String>,
    update_count: Option<u64>,
}

/// Cursor running one statement at a time
pub struct PrestoCursor {
    params: Arc<ConnectionParams>,
    session: Arc<HttpSession>,
    source: Arc<str>,
    closed: Arc<AtomicBool>,
    array_size: usize,
    query: Option<QueryState>,
}

impl PrestoCursor {
    /// Id of the current query
    pub fn query_id(&self) -> Option<&str> {
        self.query.as_ref().map(|q| q.id.as_str())
    }

    /// Web UI link for the current query
    pub fn info_uri(&self) -> Option<&str> {
        self.query.as_ref().and_then(|q| q.info_uri.as_deref())
    }

    /// Latest statistics for the current query
    pub fn stats(&self) -> Option<&StatementStats> {
        self.query.as_ref().map(|q| &q.stats)
    }

    /// Update type reported for DDL/DML statements
    pub fn update_type(&self) -> Option<&str> {
        self.query.as_ref().and_then(|q| q.update_type.as_deref())
    }

    /// Rows affected by a DML statement
    pub fn update_count(&self) -> Option<u64> {
        self.query.as_ref().and_then(|q| q.update_count)
    }

    /// Rows returned by `fetch_many(None)`
    pub fn array_size(&self) -> usize {
        self.array_size
    }

    /// Change the default fetch size
    pub fn set_array_size(&mut self, array_size: usize) {
        self.array_size = array_size.max(1);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    fn with_headers(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header(HEADER_USER, self.params.user.as_str())
            .header(HEADER_CATALOG, self.params.catalog.as_str())
            .header(HEADER_SCHEMA, self.params.schema.as_str())
            .header(HEADER_SOURCE, &*self.source);

        match &self.params.auth {
            Some(auth) => request.basic_auth(&auth.user, Some(&auth.password)),
            None => request,
        }
    }

    /// Send a request, retrying while the coordinator answers 503
    async fn send<F>(&self, url: &str, build: F) -> Result<QueryResults>
    where
        F: Fn(&Client) -> RequestBuilder + Send,
    {
        let client = self.session.client_for(url);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let response = self.with_headers(build(client)).send().await?;
            let status = response.status();

            if status == StatusCode::SERVICE_UNAVAILABLE && attempt < UNAVAILABLE_ATTEMPTS {
                tracing::debug!(attempt, url = %url, "coordinator unavailable, retrying");
                tokio::time::sleep(UNAVAILABLE_BACKOFF).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
                return Err(Error::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                    body: preview,
                });
            }

            let body = response.bytes().await?;
            return serde_json::from_slice(&body).map_err(|e| {
                Error::Protocol(format!("undecodable response from {}: {}", url, e))
            });
        }
    }

    fn apply_page(&mut self, page: QueryResults) -> Result<()> {
        let query = self.query.as_mut().ok_or_else(not_executed)?;

        if let Some(info) = page.error {
            query.next_uri = None;
            query.buffer.clear();
            tracing::debug!(query_id = %page.id, error = %info.message, "query failed");
            return Err(Error::Query(info.into_query_error(&page.id)));
        }

        query.id = page.id;
        if page.info_uri.is_some() {
            query.info_uri = page.info_uri;
        }
        if page.columns.is_some() {
            query.columns = page.columns;
        }
        if let Some(data) = page.data {
            query.buffer.extend(data);
        }
        if let Some(stats) = page.stats {
            query.stats = stats;
        }
        if page.update_type.is_some() {
            query.update_type = page.update_type;
        }
        if page.update_count.is_some() {
            query.update_count = page.update_count;
        }
        query.next_uri = page.next_uri;
        Ok(())
    }

    /// Fetch the next page, if the query has one
    async fn advance(&mut self) -> Result<bool> {
        let next_uri = match self.query.as_ref().and_then(|q| q.next_uri.clone()) {
            Some(uri) => uri,
            None => return Ok(false),
        };
        let page = self.send(&next_uri, |client| client.get(&next_uri)).await?;
        self.apply_page(page)?;
        Ok(true)
    }

    fn buffered(&self) -> usize {
        self.query.as_ref().map_or(0, |q| q.buffer.len())
    }

    fn drain(&mut self, n: usize) -> Vec<Row> {
        match self.query.as_mut() {
            Some(query) => {
                let n = n.min(query.buffer.len());
                query.buffer.drain(..n).collect()
            }
            None => Vec::new(),
        }
    }

    async fn cancel_running(&mut self) {
        let next_uri = match self.query.as_mut().and_then(|q| q.next_uri.take()) {
            Some(uri) => uri,
            None => return,
        };
        let client = self.session.client_for(&next_uri);
        match self.with_headers(client.delete(&next_uri)).send().await {
            Ok(response) => {
                tracing::debug!(status = %response.status(), "cancelled running query")
            }
            Err(e) => tracing::warn!(error = %e, "failed to cancel running query"),
        }
    }
}

impl RawCursor for PrestoCursor {
    async fn execute(&mut self, statement: &str, params: Option<&[Value]>) -> Result<()> {
        self.ensure_open()?;
        self.cancel_running().await;

        let (body, prepared) = match params {
            Some(values) if !values.is_empty() => {
                let name = format!(
                    "st_{}",
                    PREPARED_STATEMENT_COUNT.fetch_add(1, Ordering::Relaxed)
                );
                let encoded: String =
                    url::form_urlencoded::byte_serialize(statement.as_bytes()).collect();
                (
                    format!("EXECUTE {} USING {}", name, render_literals(values)?),
                    Some(format!("{}={}", name, encoded)),
                )
            }
            _ => (statement.to_string(), None),
        };

        self.query = Some(QueryState::default());
        let url = self.params.statement_url();
        let page = self
            .send(&url, |client| {
                let request = client.post(&url).body(body.clone());
                match &prepared {
                    Some(header) => request.header(HEADER_PREPARED_STATEMENT, header.as_str()),
                    None => request,
                }
            })
            .await?;

        tracing::debug!(query_id = %page.id, "statement submitted");
        self.apply_page(page)
    }

    async fn fetch_many(&mut self, size: Option<usize>) -> Result<Vec<Row>> {
        self.ensure_open()?;
        if self.query.is_none() {
            return Err(not_executed());
        }

        let wanted = size.unwrap_or(self.array_size);
        while self.buffered() < wanted {
            if !self.advance().await? {
                break;
            }
        }
        Ok(self.drain(wanted))
    }

    fn description(&self) -> Option<&[Column]> {
        self.query.as_ref().and_then(|q| q.columns.as_deref())
    }

    async fn close(&mut self) -> Result<()> {
        self.cancel_running().await;
        Ok(())
    }

    async fn fetch_all(&mut self) -> Result<Vec<Row>> {
        self.ensure_open()?;
        if self.query.is_none() {
            return Err(not_executed());
        }

        while self.advance().await? {}
        Ok(self.drain(usize::MAX))
    }
}

impl std::fmt::Debug for PrestoCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrestoCursor")
            .field("query_id", &self.query_id())
            .field("array_size", &self.array_size)
            .field("buffered", &self.buffered())
            .finish()
    }
}

fn render_literals(values: &[Value]) -> Result<String> {
    let literals = values
        .iter()
        .map(render_literal)
        .collect::<Result<Vec<_>>>()?;
    Ok(literals.join(", "))
}

/// Render a parameter as a SQL literal for `EXECUTE ... USING`
fn render_literal(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        Value::Array(items) => Ok(format!("ARRAY[{}]", render_literals(items)?)),
        Value::Object(_) => Err(Error::Usage("object parameters are not supported")),
    }
}
