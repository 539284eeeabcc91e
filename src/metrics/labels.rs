//! Metric names and label values

/// Connections opened through `connect`
pub const CONNECTIONS_TOTAL: &str = "presto_stream_connections_total";
/// Statements executed through a cursor proxy
pub const QUERIES_TOTAL: &str = "presto_stream_queries_total";
/// Batches fetched while iterating
pub const BATCHES_FETCHED_TOTAL: &str = "presto_stream_batches_fetched_total";
/// Rows handed to callers
pub const ROWS_YIELDED_TOTAL: &str = "presto_stream_rows_yielded_total";
/// Readiness probe attempts
pub const READINESS_ATTEMPTS_TOTAL: &str = "presto_stream_readiness_attempts_total";

/// Time spent in execute, eager first fetch included
pub const EXECUTE_DURATION_SECONDS: &str = "presto_stream_execute_duration_seconds";
/// Rows per fetched batch
pub const BATCH_SIZE_ROWS: &str = "presto_stream_batch_size_rows";

/// Label key for outcomes
pub const OUTCOME: &str = "outcome";
/// Label key for error categories
pub const ERROR_CATEGORY: &str = "error_category";

/// Outcome: success
pub const OUTCOME_OK: &str = "ok";
/// Outcome: failure
pub const OUTCOME_ERROR: &str = "error";
/// Outcome: transient failure that will be retried
pub const OUTCOME_RETRY: &str = "retry";
