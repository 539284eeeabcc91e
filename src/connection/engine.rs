//! Remote engine boundary
//!
//! The proxies in this crate wrap any driver that implements these traits.
//! [`crate::presto`] provides the HTTP implementation used by
//! [`connect`](crate::connect).

use super::session::HttpSession;
use crate::client::ConnectionParams;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

/// One result row: column values in column order
pub type Row = Vec<Value>;

/// Rows requested per call by the default [`RawCursor::fetch_all`]
pub const FETCH_ALL_CHUNK: usize = 10_000;

/// Column descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Engine type name (e.g. `varchar`, `bigint`)
    #[serde(rename = "type", default)]
    pub type_name: String,
}

impl Column {
    /// Create a column descriptor
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Factory for raw connections
pub trait Engine {
    /// Connection type produced by this engine
    type Connection: RawConnection;

    /// Open a connection with the given parameters
    fn connect(
        &self,
        params: &ConnectionParams,
    ) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// Driver-level connection
pub trait RawConnection: Send {
    /// Cursor type handed out by this connection
    type Cursor: RawCursor;

    /// Create a new cursor
    fn cursor(&self) -> Result<Self::Cursor>;

    /// Transport session used for requests
    fn session(&self) -> &HttpSession;

    /// Mutable access to the transport session
    fn session_mut(&mut self) -> &mut HttpSession;

    /// Replace the transport session. Cursors created afterwards use the new one.
    fn install_session(&mut self, session: HttpSession);

    /// Close the connection; cursors created from it stop working
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Driver-level cursor
pub trait RawCursor: Send {
    /// Submit a statement, optionally with positional parameters
    fn execute(
        &mut self,
        statement: &str,
        params: Option<&[Value]>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fetch up to `size` rows; `None` asks for the driver's default amount.
    /// An empty batch means the result set is exhausted.
    fn fetch_many(&mut self, size: Option<usize>) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Column descriptors, once the driver knows them
    fn description(&self) -> Option<&[Column]>;

    /// Release server-side resources held by the current statement
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Fetch every remaining row
    fn fetch_all(&mut self) -> impl Future<Output = Result<Vec<Row>>> + Send {
        async move {
            let mut rows = Vec::new();
            loop {
                let batch = self.fetch_many(Some(FETCH_ALL_CHUNK)).await?;
                if batch.is_empty() {
                    return Ok(rows);
                }
                rows.extend(batch);
            }
        }
    }
}

/// Error returned when a cursor is used before `execute`
pub(crate) fn not_executed() -> Error {
    Error::Usage("execute() must be called before fetching rows")
}
