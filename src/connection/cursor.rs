//! Cursor proxy: eager error surfacing and batched row streaming
//!
//! [`CursorProxy::execute`] submits the statement and immediately performs one
//! fetch of the driver's default size. Drivers that only report statement
//! errors, or fill in column descriptors, once results are fetched therefore
//! fail (or describe their columns) at `execute` time.
//!
//! Rows are then consumed with [`CursorProxy::next_row`] or
//! [`CursorProxy::rows`]. Once the first batch is drained, batches of
//! `batch_size` rows are fetched on demand; the stream ends at the first empty
//! batch. A short batch does not end the stream.
//!
//! The stream is single-pass: after it ends, iterating again yields nothing
//! until the next `execute`.

use super::engine::{Column, RawCursor, Row};
use super::state::CursorState;
use crate::{Error, Result};
use futures::stream::{self, Stream};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::Instrument;

const ITERATE_INSTEAD: &str = "iterate over the cursor to get results";

/// Proxy around a driver cursor
pub struct CursorProxy<C> {
    cursor: C,
    batch_size: usize,
    rows: VecDeque<Row>,
    state: CursorState,
}

impl<C: RawCursor> CursorProxy<C> {
    /// Wrap a driver cursor
    pub fn new(cursor: C, batch_size: usize) -> Self {
        Self {
            cursor,
            batch_size: batch_size.max(1),
            rows: VecDeque::new(),
            state: CursorState::Idle,
        }
    }

    /// Execute a statement and fetch the first batch.
    ///
    /// Any error the engine raises for the statement is returned here, never
    /// from a later fetch. On success [`description`](Self::description) is
    /// populated.
    pub async fn execute(&mut self, statement: &str) -> Result<()> {
        self.execute_inner(statement, None).await
    }

    /// Execute a statement with positional parameters
    pub async fn execute_with_params(&mut self, statement: &str, params: &[Value]) -> Result<()> {
        self.execute_inner(statement, Some(params)).await
    }

    async fn execute_inner(&mut self, statement: &str, params: Option<&[Value]>) -> Result<()> {
        self.state.transition(CursorState::Executing)?;
        self.rows.clear();
        let started = Instant::now();

        let cursor = &mut self.cursor;
        let outcome = async {
            cursor.execute(statement, params).await?;
            cursor.fetch_many(None).await
        }
        .instrument(tracing::debug_span!("execute", statement = %statement))
        .await;

        crate::metrics::histograms::execute_duration(started.elapsed());

        match outcome {
            Ok(first) => {
                crate::metrics::counters::query_succeeded();
                tracing::debug!(rows = first.len(), "first batch fetched");
                if first.is_empty() {
                    self.state.transition(CursorState::Exhausted)?;
                } else {
                    self.rows.extend(first);
                    self.state.transition(CursorState::Streaming)?;
                }
                Ok(())
            }
            Err(e) => {
                crate::metrics::counters::query_failed(e.category());
                tracing::debug!(error = %e, "execute failed");
                self.state.transition(CursorState::Idle)?;
                Err(e)
            }
        }
    }

    /// Next row, fetching another batch when the current one is drained.
    ///
    /// Returns `Ok(None)` once a fetch comes back empty, and on every call
    /// after that. A fetch error is returned once and ends the stream.
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            if self.state != CursorState::Streaming {
                return Ok(None);
            }

            if let Some(row) = self.rows.pop_front() {
                crate::metrics::counters::rows_yielded(1);
                return Ok(Some(row));
            }

            match self.cursor.fetch_many(Some(self.batch_size)).await {
                Ok(batch) if batch.is_empty() => {
                    tracing::debug!("result set exhausted");
                    self.state.transition(CursorState::Exhausted)?;
                    return Ok(None);
                }
                Ok(batch) => {
                    crate::metrics::counters::batch_fetched();
                    crate::metrics::histograms::batch_size(batch.len());
                    tracing::debug!(rows = batch.len(), "batch fetched");
                    self.rows.extend(batch);
                }
                Err(e) => {
                    self.state.transition(CursorState::Exhausted)?;
                    return Err(e);
                }
            }
        }
    }

    /// Stream of the remaining rows.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example() -> presto_stream::Result<()> {
    /// use futures::TryStreamExt;
    /// use presto_stream::{connect, ClientConfig};
    ///
    /// let conn = connect("presto://db.example.org/hive/default", &ClientConfig::default()).await?;
    /// let mut cursor = conn.cursor()?;
    /// cursor.execute("SELECT patient_id FROM patients").await?;
    ///
    /// let mut rows = std::pin::pin!(cursor.rows());
    /// while let Some(row) = rows.try_next().await? {
    ///     println!("{:?}", row);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn rows(&mut self) -> impl Stream<Item = Result<Row>> + '_ {
        stream::try_unfold(self, |cursor| async move {
            let row = cursor.next_row().await?;
            Ok::<_, Error>(row.map(|row| (row, cursor)))
        })
    }

    /// Disabled: iterate with [`next_row`](Self::next_row) or [`rows`](Self::rows)
    pub fn fetch_one(&mut self) -> Result<Option<Row>> {
        Err(Error::Usage(ITERATE_INSTEAD))
    }

    /// Disabled: iterate with [`next_row`](Self::next_row) or [`rows`](Self::rows)
    pub fn fetch_many(&mut self, _size: Option<usize>) -> Result<Vec<Row>> {
        Err(Error::Usage(ITERATE_INSTEAD))
    }

    /// Disabled: iterate with [`next_row`](Self::next_row) or [`rows`](Self::rows)
    pub fn fetch_all(&mut self) -> Result<Vec<Row>> {
        Err(Error::Usage(ITERATE_INSTEAD))
    }

    /// Column descriptors of the last executed statement
    pub fn description(&self) -> Option<&[Column]> {
        self.cursor.description()
    }

    /// Column names of the last executed statement
    pub fn column_names(&self) -> Vec<&str> {
        self.description()
            .map(|columns| columns.iter().map(|c| c.name.as_str()).collect())
            .unwrap_or_default()
    }

    /// Close the underlying cursor
    pub async fn close(&mut self) -> Result<()> {
        self.rows.clear();
        if self.state == CursorState::Streaming {
            self.state.transition(CursorState::Exhausted)?;
        }
        self.cursor.close().await
    }
}

impl<C> CursorProxy<C> {
    /// Current state
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Rows per fetched batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Change the batch size for subsequent fetches
    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size.max(1);
    }

    /// Rows fetched from the engine but not yet yielded
    pub fn buffered(&self) -> usize {
        self.rows.len()
    }

    /// The wrapped driver cursor
    pub fn inner(&self) -> &C {
        &self.cursor
    }

    /// Mutable access to the wrapped driver cursor.
    ///
    /// Fetching through this bypasses the batch buffer.
    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.cursor
    }

    /// Unwrap the driver cursor, dropping buffered rows
    pub fn into_inner(self) -> C {
        self.cursor
    }
}

impl<C> std::fmt::Debug for CursorProxy<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorProxy")
            .field("state", &self.state)
            .field("batch_size", &self.batch_size)
            .field("buffered", &self.rows.len())
            .finish()
    }
}
