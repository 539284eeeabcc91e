//! Counter metrics

use super::labels;

/// Record a connection attempt
pub fn connection_opened(outcome: &'static str) {
    metrics::counter!(labels::CONNECTIONS_TOTAL, labels::OUTCOME => outcome).increment(1);
}

/// Record a successful execute
pub fn query_succeeded() {
    metrics::counter!(labels::QUERIES_TOTAL, labels::OUTCOME => labels::OUTCOME_OK).increment(1);
}

/// Record a failed execute
pub fn query_failed(category: &'static str) {
    metrics::counter!(
        labels::QUERIES_TOTAL,
        labels::OUTCOME => labels::OUTCOME_ERROR,
        labels::ERROR_CATEGORY => category
    )
    .increment(1);
}

/// Record a fetched batch
pub fn batch_fetched() {
    metrics::counter!(labels::BATCHES_FETCHED_TOTAL).increment(1);
}

/// Record rows handed to the caller
pub fn rows_yielded(count: u64) {
    metrics::counter!(labels::ROWS_YIELDED_TOTAL).increment(count);
}

/// Record a readiness probe attempt
pub fn readiness_attempt(outcome: &'static str) {
    metrics::counter!(labels::READINESS_ATTEMPTS_TOTAL, labels::OUTCOME => outcome).increment(1);
}
