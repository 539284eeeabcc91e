//! presto-stream: connection and cursor proxies for Presto coordinators
//!
//! Results are streamed in batches instead of being loaded whole:
//! [`CursorProxy::execute`] surfaces statement errors immediately and
//! performs one eager fetch, after which rows are pulled on demand in
//! batches of [`ClientConfig::batch_size`].
//!
//! ```no_run
//! use futures::TryStreamExt;
//! use presto_stream::{connect, ClientConfig};
//!
//! # async fn example() -> presto_stream::Result<()> {
//! let config = ClientConfig::from_env()?;
//! let conn = connect("presto://db.example.org/hive/default", &config).await?;
//! let mut cursor = conn.cursor()?;
//! cursor.execute("SELECT patient_id FROM patients").await?;
//!
//! let mut rows = std::pin::pin!(cursor.rows());
//! while let Some(row) = rows.try_next().await? {
//!     println!("{:?}", row);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Client-certificate (PKCS#12) authentication is enabled by setting
//! [`ClientConfig::certificate`], or `PFX_PATH` and `PFX_PASSWORD_PATH` when
//! using [`ClientConfig::from_env`].

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod presto;
pub mod shell;

pub use client::{wait_for_presto, wait_until_ready, ConnectionParams};
pub use config::{CertificateBundle, ClientConfig, ClientConfigBuilder, TrustOverrides};
pub use connection::{
    connect, connect_with, Column, ConnectionProxy, CursorProxy, CursorState, Engine,
    RawConnection, RawCursor, Row,
};
pub use error::{Error, QueryError, Result};
