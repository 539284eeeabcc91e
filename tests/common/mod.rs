//! Scripted in-memory engine shared by the integration tests

#![allow(dead_code)]

use presto_stream::client::ConnectionParams;
use presto_stream::connection::{HttpSession, SessionSettings};
use presto_stream::{Column, Engine, Error, QueryError, RawConnection, RawCursor, Result, Row};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// What the engine does with a statement
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Succeed and serve these rows
    Rows(Vec<Row>),
    /// Reject the statement at execute time
    Reject(String),
    /// Accept the statement, then fail fetch number `n` (0 = first fetch)
    FailFetch { rows: Vec<Row>, n: usize, message: String },
}

/// Everything the engine saw
#[derive(Debug, Default)]
pub struct Log {
    pub connects: usize,
    pub cursors: usize,
    pub executed: Vec<String>,
    pub fetches: Vec<Option<usize>>,
    pub connection_closed: bool,
    pub cursors_closed: usize,
}

/// Engine answering statements from a fixed script
#[derive(Clone)]
pub struct ScriptedEngine {
    outcomes: Arc<HashMap<String, Outcome>>,
    default_fetch: usize,
    refuse_connects: usize,
    log: Arc<Mutex<Log>>,
}

impl ScriptedEngine {
    /// `default_fetch` is the batch size of `fetch_many(None)`
    pub fn new(default_fetch: usize) -> Self {
        Self {
            outcomes: Arc::new(HashMap::new()),
            default_fetch,
            refuse_connects: 0,
            log: Arc::new(Mutex::new(Log::default())),
        }
    }

    pub fn with(mut self, statement: &str, outcome: Outcome) -> Self {
        Arc::make_mut(&mut self.outcomes).insert(statement.to_string(), outcome);
        self
    }

    /// Refuse the first `n` connection attempts with a connection error
    pub fn refusing_connects(mut self, n: usize) -> Self {
        self.refuse_connects = n;
        self
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, Log> {
        self.log.lock().expect("log lock")
    }
}

impl Engine for ScriptedEngine {
    type Connection = ScriptedConnection;

    async fn connect(&self, _params: &ConnectionParams) -> Result<ScriptedConnection> {
        let attempt = {
            let mut log = self.log();
            log.connects += 1;
            log.connects
        };
        if attempt <= self.refuse_connects {
            return Err(Error::Connection("connection refused".to_string()));
        }
        Ok(ScriptedConnection {
            engine: self.clone(),
            session: HttpSession::new(SessionSettings::default())?,
            closed: false,
        })
    }
}

pub struct ScriptedConnection {
    engine: ScriptedEngine,
    session: HttpSession,
    closed: bool,
}

impl RawConnection for ScriptedConnection {
    type Cursor = ScriptedCursor;

    fn cursor(&self) -> Result<ScriptedCursor> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        self.engine.log().cursors += 1;
        Ok(ScriptedCursor {
            engine: self.engine.clone(),
            pending: VecDeque::new(),
            columns: None,
            fail_at: None,
            fetch_count: 0,
        })
    }

    fn session(&self) -> &HttpSession {
        &self.session
    }

    fn session_mut(&mut self) -> &mut HttpSession {
        &mut self.session
    }

    fn install_session(&mut self, session: HttpSession) {
        self.session = session;
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.engine.log().connection_closed = true;
        Ok(())
    }
}

pub struct ScriptedCursor {
    engine: ScriptedEngine,
    pending: VecDeque<Row>,
    columns: Option<Vec<Column>>,
    fail_at: Option<(usize, String)>,
    fetch_count: usize,
}

impl RawCursor for ScriptedCursor {
    async fn execute(&mut self, statement: &str, _params: Option<&[Value]>) -> Result<()> {
        self.engine.log().executed.push(statement.to_string());
        self.pending.clear();
        self.fail_at = None;
        self.fetch_count = 0;

        let outcome = self
            .engine
            .outcomes
            .get(statement)
            .cloned()
            .unwrap_or_else(|| Outcome::Reject(format!("line 1:1: mismatched input '{}'", statement)));

        match outcome {
            Outcome::Rows(rows) => self.pending = rows.into(),
            Outcome::Reject(message) => return Err(QueryError::new(message).into()),
            Outcome::FailFetch { rows, n, message } => {
                self.pending = rows.into();
                self.fail_at = Some((n, message));
            }
        }
        self.columns = Some(vec![Column::new("n", "bigint")]);
        Ok(())
    }

    async fn fetch_many(&mut self, size: Option<usize>) -> Result<Vec<Row>> {
        self.engine.log().fetches.push(size);
        let index = self.fetch_count;
        self.fetch_count += 1;

        if let Some((n, message)) = &self.fail_at {
            if *n == index {
                return Err(QueryError::new(message.clone()).into());
            }
        }

        let n = size.unwrap_or(self.engine.default_fetch).min(self.pending.len());
        Ok(self.pending.drain(..n).collect())
    }

    fn description(&self) -> Option<&[Column]> {
        self.columns.as_deref()
    }

    async fn close(&mut self) -> Result<()> {
        self.engine.log().cursors_closed += 1;
        Ok(())
    }
}

/// Single-column rows holding `values`
pub fn rows(values: impl IntoIterator<Item = i64>) -> Vec<Row> {
    values.into_iter().map(|v| vec![json!(v)]).collect()
}

/// First column of each row as an integer
pub fn values(rows: &[Row]) -> Vec<i64> {
    rows.iter()
        .map(|r| r[0].as_i64().expect("integer column"))
        .collect()
}

pub const URL: &str = "presto://localhost:8080/hive/default";
