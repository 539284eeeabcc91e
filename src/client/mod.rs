//! Connection URLs and startup readiness polling

mod connection_string;
mod readiness;

pub use connection_string::{
    BasicAuth, ConnectionParams, HttpScheme, ANONYMOUS_USER, DEFAULT_PORT, PRESTO_SCHEME,
};
pub use readiness::{wait_for_presto, wait_until_ready, DEFAULT_PROBE, RETRY_INTERVAL};
