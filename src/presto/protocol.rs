//! Presto client REST protocol: headers and response documents

use crate::connection::{Column, Row};
use crate::error::QueryError;
use serde::Deserialize;
use serde_json::Value;

/// Header carrying the session user
pub const HEADER_USER: &str = "X-Presto-User";
/// Header carrying the default catalog
pub const HEADER_CATALOG: &str = "X-Presto-Catalog";
/// Header carrying the default schema
pub const HEADER_SCHEMA: &str = "X-Presto-Schema";
/// Header identifying the client application
pub const HEADER_SOURCE: &str = "X-Presto-Source";
/// Header declaring prepared statements for `EXECUTE ... USING`
pub const HEADER_PREPARED_STATEMENT: &str = "X-Presto-Prepared-Statement";

/// Statement submission path
pub const STATEMENT_PATH: &str = "/v1/statement";

/// One page of query results
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResults {
    /// Query id assigned by the coordinator
    pub id: String,
    /// Web UI link for the query
    #[serde(default)]
    pub info_uri: Option<String>,
    /// Where to GET the next page; absent once the query is finished
    #[serde(default)]
    pub next_uri: Option<String>,
    /// Column descriptors, present once known
    #[serde(default)]
    pub columns: Option<Vec<Column>>,
    /// Rows in this page
    #[serde(default)]
    pub data: Option<Vec<Row>>,
    /// Execution statistics
    #[serde(default)]
    pub stats: Option<StatementStats>,
    /// Failure details
    #[serde(default)]
    pub error: Option<ErrorInfo>,
    /// Kind of update for DDL/DML statements
    #[serde(default)]
    pub update_type: Option<String>,
    /// Affected row count for DML statements
    #[serde(default)]
    pub update_count: Option<u64>,
}

/// Execution statistics reported with each page
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementStats {
    /// Query state (`QUEUED`, `RUNNING`, `FINISHED`, `FAILED`, ...)
    #[serde(default)]
    pub state: String,
    /// Whether the query is waiting in a resource group queue
    #[serde(default)]
    pub queued: bool,
    /// Rows processed so far
    #[serde(default)]
    pub processed_rows: u64,
    /// Bytes processed so far
    #[serde(default)]
    pub processed_bytes: u64,
    /// Elapsed wall time in milliseconds
    #[serde(default)]
    pub elapsed_time_millis: u64,
}

/// Failure details reported by the coordinator
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    /// Message
    pub message: String,
    /// Numeric code
    #[serde(default)]
    pub error_code: Option<i64>,
    /// Symbolic name
    #[serde(default)]
    pub error_name: Option<String>,
    /// Error class
    #[serde(default)]
    pub error_type: Option<String>,
    /// Anything else the coordinator sent (failure info, location)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ErrorInfo {
    /// Convert into a crate-level query error for `query_id`
    pub fn into_query_error(self, query_id: &str) -> QueryError {
        QueryError {
            message: self.message,
            error_name: self.error_name,
            error_type: self.error_type,
            error_code: self.error_code,
            query_id: Some(query_id.to_string()),
        }
    }
}
