//! Connection management
//!
//! This module handles:
//! * The remote engine boundary (driver connection and cursor traits)
//! * Connection and cursor proxies with batched streaming
//! * Cursor state machine enforcement
//! * HTTP transport sessions, client certificates and trust overrides

mod cursor;
mod engine;
mod proxy;
mod session;
mod state;
mod tls;

pub use cursor::CursorProxy;
pub use engine::{Column, Engine, RawConnection, RawCursor, Row, FETCH_ALL_CHUNK};
pub use proxy::{connect, connect_with, ConnectionProxy};
pub use session::{HttpSession, SessionSettings};
pub use state::CursorState;
pub use tls::{adapt_connection, apply_trust_override, load_trust_anchors, read_passphrase, Pkcs12Adapter};

pub(crate) use engine::not_executed;
