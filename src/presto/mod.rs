//! Presto driver
//!
//! Implements the [`Engine`](crate::connection::Engine) traits over the
//! Presto client REST protocol: statements are POSTed to `/v1/statement`
//! and result pages are followed through `nextUri` until the query finishes.

mod client;
pub mod protocol;

pub use client::{PrestoConnection, PrestoCursor, PrestoEngine, DEFAULT_ARRAY_SIZE};
pub use protocol::{ErrorInfo, QueryResults, StatementStats};
