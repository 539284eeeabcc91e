//! Histogram metrics

use super::labels;
use std::time::Duration;

/// Record how long an execute took
pub fn execute_duration(duration: Duration) {
    metrics::histogram!(labels::EXECUTE_DURATION_SECONDS).record(duration.as_secs_f64());
}

/// Record the number of rows in a fetched batch
pub fn batch_size(rows: usize) {
    metrics::histogram!(labels::BATCH_SIZE_ROWS).record(rows as f64);
}
